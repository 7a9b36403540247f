use crate::utils::Error;
use percent_encoding::percent_decode_str;
use std::borrow::Cow;
use std::fmt;

/// The reconciled snapshot of a subscription item.
///
/// A snapshot is an ordered sequence of nullable fields, one per entry in
/// the subscription's schema. A `None` slot means the server set the field
/// to null, which is distinct from an empty string.
///
/// Snapshots are immutable; [`Values::update`] consumes an update's tokens
/// and produces the next snapshot, leaving the current one untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Values(Vec<Option<String>>);

impl Values {
    /// Number of fields in the snapshot.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the snapshot holds no fields.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the field at `index`, or `None` when the field is null or
    /// out of range.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).and_then(|v| v.as_deref())
    }

    /// Iterates over the fields in schema order.
    pub fn iter(&self) -> impl Iterator<Item = Option<&str>> {
        self.0.iter().map(|v| v.as_deref())
    }

    /// Applies the delta rules of an update body to this snapshot and
    /// returns the next one.
    ///
    /// `update` holds the pipe-separated tokens of a `U` message body:
    ///
    /// - an empty token leaves the field unchanged
    /// - `#` sets the field to null
    /// - `$` sets the field to the empty string
    /// - `^n` advances the cursor by `n` fields without writing, counting
    ///   the current field
    /// - anything else is percent-decoded and stored as the new value
    ///
    /// An update applied to an empty snapshot fixes the snapshot length to
    /// the token count; afterwards the length never changes. The cursor
    /// must land exactly on the snapshot length when the tokens run out.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUpdate`] when the tokens over- or undershoot
    /// the snapshot length, or when a `^` step is not a non-negative
    /// integer.
    pub fn update(&self, update: &[String]) -> Result<Values, Error> {
        let len = if self.0.is_empty() {
            update.len()
        } else {
            self.0.len()
        };
        let mut next = self.0.clone();
        next.resize(len, None);

        let mut idx = 0;
        for value in update {
            if idx >= len {
                return Err(Error::InvalidUpdate("too many values in update".to_string()));
            }
            match value.as_str() {
                "" => {}
                "#" => next[idx] = None,
                "$" => next[idx] = Some(String::new()),
                v if v.starts_with('^') => {
                    let step: usize = v[1..].parse().map_err(|_| {
                        Error::InvalidUpdate(format!("invalid step value {:?}", &v[1..]))
                    })?;
                    idx += step;
                    continue;
                }
                v => {
                    let decoded = decode(v);
                    if next[idx].as_deref() != Some(decoded.as_ref()) {
                        next[idx] = Some(decoded.into_owned());
                    }
                }
            }
            idx += 1;
        }
        if idx != len {
            return Err(Error::InvalidUpdate(
                "not enough values in update".to_string(),
            ));
        }
        Ok(Values(next))
    }
}

/// Best-effort percent decoding: a token that does not decode to valid
/// UTF-8 is kept verbatim.
fn decode(value: &str) -> Cow<'_, str> {
    match percent_decode_str(value).decode_utf8() {
        Ok(decoded) => decoded,
        Err(_) => Cow::Borrowed(value),
    }
}

impl fmt::Display for Values {
    /// Renders the snapshot as comma-separated fields, with `<nil>` for
    /// null fields.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(value.as_deref().unwrap_or("<nil>"))?;
        }
        Ok(())
    }
}
