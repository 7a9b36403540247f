/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 25/10/25
******************************************************************************/

mod message;
mod stream;

pub use message::{ControlMessage, SessionMessage};
pub use stream::MessageStream;
