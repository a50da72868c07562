//! Single exit path for unrecoverable errors.

use tracing::error;

use crate::error::ProtocolError;
use crate::protocol::session::Session;
use crate::service::console::Console;

/// Process exit status reported after a fatal error
pub const FAILURE_STATUS: u8 = 1;

/// Release the session's socket, report `err` once, and return the exit status.
///
/// After this returns the session is in the exiting phase and owns no connection.
pub fn fatal<S, C: Console>(session: &mut Session<S>, console: &mut C, err: &ProtocolError) -> u8 {
    let phase = session.phase();
    session.abandon();

    error!(kind = ?err.kind(), %phase, error = %err, "Fatal error, terminating session");
    console.print_error(&format!("Error: {err}"));

    FAILURE_STATUS
}
