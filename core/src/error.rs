use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Message text does not fit any supported message format")]
    InvalidMessageFormat,

    #[error("Payload must be exactly 10 bytes (77 bits)")]
    InvalidPayloadLength,

    #[error("Invalid input size")]
    InvalidInputSize,

    #[error("Checksum mismatch")]
    CrcMismatch,

    #[error("Iterative FEC decode did not converge")]
    FecDecodeFailure,

    #[error("Requested working-set size cannot be allocated")]
    ResourceExhausted,

    #[error("Decoder used before initialization or after release")]
    NotInitialized,
}

pub type Result<T> = std::result::Result<T, CodecError>;
