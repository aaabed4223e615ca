//! External converters: the headless office suite and qpdf.
//!
//! Programs are always started from an argument vector, never through a
//! shell. Each run is bounded by the configured timeout; the child is killed
//! when the timeout elapses or when the request future is dropped.

use crate::config::Settings;
use crate::error::ApiError;
use crate::workspace::Workspace;
use anyhow::Context;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

/// Runs `program` to completion and returns its captured output, whatever the exit status.
pub async fn run(
    program: &Path,
    args: &[OsString],
    timeout: Duration,
    operation: &'static str,
) -> Result<Output, ApiError> {
    let name = program.display().to_string();
    tracing::debug!(program = %name, ?args, "spawning converter");

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    match tokio::time::timeout(timeout, child).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(err)) => Err(ApiError::conversion(
            operation,
            format!("cannot run {name}: {err}"),
        )),
        Err(_) => Err(ApiError::ConverterTimeout {
            program: name,
            secs: timeout.as_secs(),
        }),
    }
}

/// A document conversion performed by the office suite.
#[derive(Debug, Clone, Copy)]
pub struct OfficeTarget {
    pub operation: &'static str,
    convert_to: &'static str,
    infilter: Option<&'static str>,
    extension: &'static str,
}

pub const PDF_TO_WORD: OfficeTarget = OfficeTarget {
    operation: "pdf-to-word",
    convert_to: "docx:MS Word 2007 XML",
    infilter: Some("writer_pdf_import"),
    extension: "docx",
};

pub const WORD_TO_PDF: OfficeTarget = OfficeTarget {
    operation: "word-to-pdf",
    convert_to: "pdf",
    infilter: None,
    extension: "pdf",
};

pub const PPT_TO_PDF: OfficeTarget = OfficeTarget {
    operation: "ppt-to-pdf",
    convert_to: "pdf",
    infilter: None,
    extension: "pdf",
};

fn office_args(target: &OfficeTarget, profile: &Path, out_dir: &Path, input: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["--headless", "--norestore", "--nologo", "--nodefault"]
        .into_iter()
        .map(OsString::from)
        .collect();

    // A private profile lets concurrent conversions run without fighting over one lock.
    args.push(format!("-env:UserInstallation=file://{}", profile.display()).into());
    if let Some(filter) = target.infilter {
        args.push(format!("--infilter={filter}").into());
    }
    args.push("--convert-to".into());
    args.push(target.convert_to.into());
    args.push("--outdir".into());
    args.push(out_dir.into());
    args.push(input.into());
    args
}

/// Converts `input` with the office suite and returns the produced file.
pub async fn office_convert(
    settings: &Settings,
    workspace: &Workspace,
    input: &Path,
    target: OfficeTarget,
) -> Result<PathBuf, ApiError> {
    let profile = workspace.subdir("profile")?;
    let out_dir = workspace.subdir("converted")?;
    let args = office_args(&target, &profile, &out_dir, input);

    let output = run(
        &settings.soffice_bin,
        &args,
        settings.converter_timeout(),
        target.operation,
    )
    .await?;

    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let expected = out_dir.join(format!("{stem}.{}", target.extension));

    if !expected.is_file() {
        tracing::warn!(
            request_id = %workspace.id(),
            operation = target.operation,
            status = %output.status,
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "office suite produced no output"
        );
        return Err(ApiError::MissingOutput {
            operation: target.operation,
        });
    }

    Ok(expected)
}

/// qpdf exits with 3 when it succeeded with warnings.
const QPDF_WARNINGS: i32 = 3;

/// Decrypts `input` with qpdf, handing it the password through a file.
pub async fn qpdf_decrypt(
    settings: &Settings,
    workspace: &Workspace,
    input: &Path,
    password: &str,
) -> Result<PathBuf, ApiError> {
    let password_file = workspace.allocate("qpdf.password");
    tokio::fs::write(&password_file, password.as_bytes())
        .await
        .context("writing qpdf password file")?;
    let output_path = workspace.allocate("qpdf_unlocked.pdf");

    let mut password_arg = OsString::from("--password-file=");
    password_arg.push(&password_file);
    let args = vec![
        password_arg,
        "--decrypt".into(),
        input.into(),
        output_path.clone().into(),
    ];

    let output = match run(&settings.qpdf_bin, &args, settings.converter_timeout(), "unlock").await
    {
        Ok(output) => output,
        Err(ApiError::Conversion { detail, .. }) => return Err(ApiError::UnlockFailed { detail }),
        Err(err) => return Err(err),
    };

    let succeeded = matches!(output.status.code(), Some(0) | Some(QPDF_WARNINGS));
    if succeeded && output_path.is_file() {
        return Ok(output_path);
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    if stderr.to_lowercase().contains("invalid password") {
        return Err(ApiError::WrongPassword);
    }

    Err(ApiError::UnlockFailed {
        detail: format!("qpdf exited with {}: {}", output.status, stderr.trim()),
    })
}
