//! Startup configuration.
//!
//! Everything is read once from the command line or the environment and then
//! shared read-only with the handlers through `web::Data<Settings>`.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "PDF, office and image conversion service", long_about = None)]
pub struct Settings {
    /// Address to bind the HTTP server to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    /// Include full diagnostic traces in 500 responses. Never enable in production.
    #[arg(long, env = "DEBUG_TRACE", default_value_t = false)]
    pub debug_trace: bool,

    /// Directory under which per-request workspaces are created
    #[arg(long, env = "TEMP_ROOT", default_value_os_t = std::env::temp_dir())]
    pub temp_root: PathBuf,

    /// Maximum total size of the uploaded files of a single request, in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = 50 * 1024 * 1024)]
    pub max_upload_bytes: u64,

    /// Headless office suite used for Word, PowerPoint and PDF-to-Word conversions
    #[arg(long, env = "SOFFICE_BIN", default_value = "soffice")]
    pub soffice_bin: PathBuf,

    /// qpdf binary used as the fallback decryption path of /unlock
    #[arg(long, env = "QPDF_BIN", default_value = "qpdf")]
    pub qpdf_bin: PathBuf,

    /// Seconds after which an external converter is killed
    #[arg(long, env = "CONVERTER_TIMEOUT_SECS", default_value_t = 120)]
    pub converter_timeout_secs: u64,

    /// Directory containing the pdfium shared library. Falls back to the system library.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pub pdfium_lib_path: Option<PathBuf>,

    /// Highest DPI accepted by /pdf-to-images
    #[arg(long, env = "MAX_DPI", default_value_t = 600)]
    pub max_dpi: u32,
}

impl Settings {
    pub fn bind_addr(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }

    pub fn converter_timeout(&self) -> Duration {
        Duration::from_secs(self.converter_timeout_secs)
    }
}
