pub mod probe;
pub mod wav;

pub use probe::{format_from_content_type, sample_rate_of};
pub use wav::{encode_pcm16le, save_upload, upload_file, PCM16LE};
