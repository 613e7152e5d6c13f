//! Document submission to the registration API.

mod submitter;
mod transport;

pub use submitter::{encode_payload, DocumentSubmitter, SubmissionResult, SubmissionState};
pub use transport::{HttpReply, HttpTransport, SubmissionRequest, Transport, SIGNATURE_HEADER};
