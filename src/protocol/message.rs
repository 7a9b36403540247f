use crate::utils::Error;
use std::fmt;

/// A message received on the long-lived session stream.
///
/// One variant per TLCP message kind; unknown kinds are preserved in
/// [`SessionMessage::Unsupported`] so the reader can log and ignore them.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionMessage {
    /// Session bound: carries the server-assigned session id plus advisory
    /// request limit and keep-alive interval (ms).
    Conok {
        /// The server-assigned session id.
        session_id: String,
        /// Advisory maximum length of control requests.
        request_limit: u32,
        /// Advisory keep-alive interval, in milliseconds.
        keep_alive: u32,
        /// Address of the server to use for control requests, `*` for the
        /// current one.
        control_link: String,
    },
    /// Informational server name.
    Servname {
        /// Name reported by the server.
        server_name: String,
    },
    /// Informational client address as seen by the server.
    Clientip {
        /// Client IP address.
        client_ip: String,
    },
    /// Bandwidth ceiling granted by the server, `f64::INFINITY` for
    /// `unlimited`.
    Cons {
        /// Maximum bandwidth, in kilobits per second.
        bandwidth: f64,
    },
    /// Ignored payload used to pad the stream.
    Noop {
        /// Arbitrary preamble text.
        preamble: Vec<String>,
    },
    /// Keep-alive probe.
    Probe,
    /// Seconds elapsed since session start, as seen by the server.
    Sync {
        /// Server-side seconds since the initial response header.
        seconds_since_initial_header: u64,
    },
    /// The current stream must be closed and the session rebound.
    Loop {
        /// Seconds to wait before rebinding.
        expected_delay: u64,
    },
    /// Session terminated by the server.
    End {
        /// Cause code.
        code: i32,
        /// Human-readable cause.
        message: String,
    },
    /// Delta update for one item of one subscription.
    Update {
        /// Subscription id the update belongs to.
        subscription: u32,
        /// 1-based item index within the subscription.
        item: u32,
        /// Pipe-separated update tokens, undecoded.
        values: Vec<String>,
    },
    /// Subscription acknowledged by the server.
    Subok {
        /// Subscription id.
        subscription: u32,
        /// Number of items in the subscription.
        items: u32,
        /// Number of fields per item.
        fields: u32,
    },
    /// Effective subscription configuration.
    Conf {
        /// Subscription id.
        subscription: u32,
        /// Effective maximum frequency, `f64::INFINITY` for `unlimited`.
        max_frequency: f64,
        /// Whether frequency filtering is applied.
        filtered: bool,
    },
    /// Stream progressive counter.
    Prog {
        /// Progressive count of real-time updates sent on the session.
        progressive: u64,
    },
    /// Any message kind this client does not recognise.
    Unsupported {
        /// The first field of the line.
        kind: String,
        /// The remaining fields, verbatim.
        args: Vec<String>,
    },
}

impl SessionMessage {
    /// Parses one session-stream line (without its trailing CR/LF).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] carrying the offending line when a
    /// recognised kind has the wrong argument count or a malformed number.
    pub fn parse(line: &str) -> Result<Self, Error> {
        let mut parts = line.split(',');
        let kind = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();
        match kind {
            "CONOK" => {
                expect_args(line, &args, 4)?;
                Ok(Self::Conok {
                    session_id: args[0].to_string(),
                    request_limit: parse_number(line, "request limit", args[1])?,
                    keep_alive: parse_number(line, "keep alive time", args[2])?,
                    control_link: args[3].to_string(),
                })
            }
            "SERVNAME" => {
                expect_args(line, &args, 1)?;
                Ok(Self::Servname {
                    server_name: args[0].to_string(),
                })
            }
            "CLIENTIP" => {
                expect_args(line, &args, 1)?;
                Ok(Self::Clientip {
                    client_ip: args[0].to_string(),
                })
            }
            "CONS" => {
                expect_args(line, &args, 1)?;
                Ok(Self::Cons {
                    bandwidth: parse_frequency(line, "bandwidth", args[0])?,
                })
            }
            "NOOP" => Ok(Self::Noop {
                preamble: args.iter().map(|s| s.to_string()).collect(),
            }),
            "PROBE" => Ok(Self::Probe),
            "SYNC" => {
                expect_args(line, &args, 1)?;
                Ok(Self::Sync {
                    seconds_since_initial_header: parse_number(
                        line,
                        "seconds since initial header",
                        args[0],
                    )?,
                })
            }
            "LOOP" => {
                expect_args(line, &args, 1)?;
                Ok(Self::Loop {
                    expected_delay: parse_number(line, "expected delay", args[0])?,
                })
            }
            "END" => {
                expect_args(line, &args, 2)?;
                Ok(Self::End {
                    code: parse_number(line, "cause code", args[0])?,
                    message: args[1].to_string(),
                })
            }
            "U" => {
                expect_args(line, &args, 3)?;
                Ok(Self::Update {
                    subscription: parse_number(line, "subscription id", args[0])?,
                    item: parse_number(line, "item", args[1])?,
                    values: args[2].split('|').map(String::from).collect(),
                })
            }
            "SUBOK" => {
                expect_args(line, &args, 3)?;
                Ok(Self::Subok {
                    subscription: parse_number(line, "subscription id", args[0])?,
                    items: parse_number(line, "item count", args[1])?,
                    fields: parse_number(line, "field count", args[2])?,
                })
            }
            "CONF" => {
                expect_args(line, &args, 3)?;
                Ok(Self::Conf {
                    subscription: parse_number(line, "subscription id", args[0])?,
                    max_frequency: parse_frequency(line, "max frequency", args[1])?,
                    filtered: match args[2] {
                        "filtered" => true,
                        "unfiltered" => false,
                        other => {
                            return Err(parse_error(
                                line,
                                format!("invalid filtered option {other:?}"),
                            ));
                        }
                    },
                })
            }
            "PROG" => {
                expect_args(line, &args, 1)?;
                Ok(Self::Prog {
                    progressive: parse_number(line, "progressive count", args[0])?,
                })
            }
            _ => Ok(Self::Unsupported {
                kind: kind.to_string(),
                args: args.iter().map(|s| s.to_string()).collect(),
            }),
        }
    }
}

impl fmt::Display for SessionMessage {
    /// Renders the canonical protocol line for this message.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conok {
                session_id,
                request_limit,
                keep_alive,
                control_link,
            } => write!(f, "CONOK,{session_id},{request_limit},{keep_alive},{control_link}"),
            Self::Servname { server_name } => write!(f, "SERVNAME,{server_name}"),
            Self::Clientip { client_ip } => write!(f, "CLIENTIP,{client_ip}"),
            Self::Cons { bandwidth } => write!(f, "CONS,{}", format_frequency(*bandwidth)),
            Self::Noop { preamble } => {
                f.write_str("NOOP")?;
                for part in preamble {
                    write!(f, ",{part}")?;
                }
                Ok(())
            }
            Self::Probe => f.write_str("PROBE"),
            Self::Sync {
                seconds_since_initial_header,
            } => write!(f, "SYNC,{seconds_since_initial_header}"),
            Self::Loop { expected_delay } => write!(f, "LOOP,{expected_delay}"),
            Self::End { code, message } => write!(f, "END,{code},{message}"),
            Self::Update {
                subscription,
                item,
                values,
            } => write!(f, "U,{subscription},{item},{}", values.join("|")),
            Self::Subok {
                subscription,
                items,
                fields,
            } => write!(f, "SUBOK,{subscription},{items},{fields}"),
            Self::Conf {
                subscription,
                max_frequency,
                filtered,
            } => write!(
                f,
                "CONF,{subscription},{},{}",
                format_frequency(*max_frequency),
                if *filtered { "filtered" } else { "unfiltered" }
            ),
            Self::Prog { progressive } => write!(f, "PROG,{progressive}"),
            Self::Unsupported { kind, args } => {
                f.write_str(kind)?;
                for arg in args {
                    write!(f, ",{arg}")?;
                }
                Ok(())
            }
        }
    }
}

/// A single-line reply received on the control endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Control request accepted.
    Reqok {
        /// Echo of the client-supplied request id.
        request: u32,
    },
    /// Control request rejected.
    Reqerr {
        /// Echo of the client-supplied request id.
        request: u32,
        /// Server-supplied error code.
        code: i32,
        /// Server-supplied error message.
        message: String,
    },
    /// Any reply kind this client does not recognise.
    Unsupported {
        /// The first field of the line.
        kind: String,
        /// The remaining fields, verbatim.
        args: Vec<String>,
    },
}

impl ControlMessage {
    /// Parses one control-reply line (without its trailing CR/LF).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] carrying the offending line when a
    /// recognised kind has the wrong argument count or a malformed number.
    pub fn parse(line: &str) -> Result<Self, Error> {
        let mut parts = line.split(',');
        let kind = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();
        match kind {
            "REQOK" => {
                expect_args(line, &args, 1)?;
                Ok(Self::Reqok {
                    request: parse_number(line, "request id", args[0])?,
                })
            }
            "REQERR" => {
                expect_args(line, &args, 3)?;
                Ok(Self::Reqerr {
                    request: parse_number(line, "request id", args[0])?,
                    code: parse_number(line, "error code", args[1])?,
                    message: args[2].to_string(),
                })
            }
            _ => Ok(Self::Unsupported {
                kind: kind.to_string(),
                args: args.iter().map(|s| s.to_string()).collect(),
            }),
        }
    }
}

impl fmt::Display for ControlMessage {
    /// Renders the canonical protocol line for this reply.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reqok { request } => write!(f, "REQOK,{request}"),
            Self::Reqerr {
                request,
                code,
                message,
            } => write!(f, "REQERR,{request},{code},{message}"),
            Self::Unsupported { kind, args } => {
                f.write_str(kind)?;
                for arg in args {
                    write!(f, ",{arg}")?;
                }
                Ok(())
            }
        }
    }
}

fn expect_args(line: &str, args: &[&str], want: usize) -> Result<(), Error> {
    if args.len() != want {
        return Err(parse_error(
            line,
            format!("expected {want} arguments, got {}", args.len()),
        ));
    }
    Ok(())
}

fn parse_number<T: std::str::FromStr>(line: &str, what: &str, value: &str) -> Result<T, Error> {
    value
        .parse()
        .map_err(|_| parse_error(line, format!("invalid {what} {value:?}")))
}

/// Parses a frequency or bandwidth argument, where `unlimited` means
/// `f64::INFINITY`.
fn parse_frequency(line: &str, what: &str, value: &str) -> Result<f64, Error> {
    if value == "unlimited" {
        return Ok(f64::INFINITY);
    }
    parse_number(line, what, value)
}

fn format_frequency(value: f64) -> String {
    if value.is_infinite() {
        "unlimited".to_string()
    } else {
        value.to_string()
    }
}

fn parse_error(line: &str, reason: String) -> Error {
    Error::Parse {
        line: line.to_string(),
        reason,
    }
}
