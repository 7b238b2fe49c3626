//! Human-readable and canonical renderings of operation outcomes.

use cr_protocol::dtc::DiagnosticCode;
use cr_protocol::encoding::encode_codes;
use cr_protocol::events::CodeEvent;

use crate::report::Report;

pub const READ_ERROR_MESSAGE: &str =
    "Error while reading codes. Is the adapter connected to a car with the ignition on?";
pub const CLEAR_ERROR_MESSAGE: &str =
    "Error while clearing codes. Is the adapter connected to a car with the ignition on?";
pub const NO_CODES_MESSAGE: &str = "No fault codes. Fantastic!";
pub const CLEARED_MESSAGE: &str = "Codes cleared.";

/// Announcement when a read is started.
pub fn read_started() -> Report {
    Report::new(vec!["Reading codes...".to_string()], CodeEvent::Start)
}

/// Announcement when a clear is started.
pub fn clear_started() -> Report {
    Report::new(vec!["Clearing codes...".to_string()], CodeEvent::Clear)
}

/// Report for a finished read. An error wins over any codes.
pub fn read_finished(error: bool, codes: &[DiagnosticCode]) -> Report {
    if error {
        return Report::new(vec![READ_ERROR_MESSAGE.to_string()], CodeEvent::Error);
    }
    if codes.is_empty() {
        return Report::new(
            vec![NO_CODES_MESSAGE.to_string()],
            CodeEvent::Result(String::new()),
        );
    }

    let mut lines = Vec::with_capacity(codes.len() + 1);
    lines.push(format!("Read {} codes", codes.len()));
    lines.extend(codes.iter().map(describe_code));
    Report::new(lines, CodeEvent::Result(encode_codes(codes)))
}

/// Report for a finished clear.
pub fn clear_finished(error: bool) -> Report {
    if error {
        Report::new(vec![CLEAR_ERROR_MESSAGE.to_string()], CodeEvent::Error)
    } else {
        Report::new(vec![CLEARED_MESSAGE.to_string()], CodeEvent::Cleared)
    }
}

/// One log line per code, e.g. `P0415 (current issue)`.
pub fn describe_code(code: &DiagnosticCode) -> String {
    format!("{code} ({})", code.kind.describe())
}
