//! Exit code constants for the csvlock CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, existence precondition violated)
//! - 2: I/O failure
//! - 3: Lock wait timed out
//! - 4: Lock acquisition failure
//! - 5: Wait canceled

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments or a file that must (not) exist.
pub const USER_ERROR: i32 = 1;

/// Low-level I/O failure, including failed cleanup.
pub const IO_FAILURE: i32 = 2;

/// Lock contention was not resolved within the wait timeout.
pub const TIMEOUT: i32 = 3;

/// Lock acquisition failure: a conflicting control file exists.
pub const LOCK_FAILURE: i32 = 4;

/// The wait was canceled before a lock could be acquired.
pub const CANCELED: i32 = 5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [SUCCESS, USER_ERROR, IO_FAILURE, TIMEOUT, LOCK_FAILURE, CANCELED];
        for (i, &a) in codes.iter().enumerate() {
            for (j, &b) in codes.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b, "Exit codes must be distinct");
                }
            }
        }
    }
}
