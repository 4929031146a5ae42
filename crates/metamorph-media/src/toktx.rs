//! `toktx` invocation for the static-image KTX2 encode step.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use metamorph_models::ImageTarget;

use crate::error::{MediaError, MediaResult};

fn flags_for(target: ImageTarget) -> &'static [&'static str] {
    match target {
        ImageTarget::UASTC => &[
            "--t2",
            "--uastc",
            "--genmipmap",
            "--zcmp",
            "3",
            "--lower_left_maps_to_s0t0",
            "--assign_oetf",
            "srgb",
        ],
        ImageTarget::ASTC => &[
            "--t2",
            "--encode",
            "astc",
            "--astc_blk_d",
            "8x8",
            "--genmipmap",
            "--assign_oetf",
            "srgb",
        ],
        ImageTarget::AstcHigh => &[
            "--t2",
            "--encode",
            "astc",
            "--astc_blk_d",
            "4x4",
            "--genmipmap",
            "--assign_oetf",
            "srgb",
        ],
    }
}

/// Runs `toktx` against a preprocessed (resized, lossless-PNG) input,
/// producing a `.ktx2` file at `output`.
pub async fn encode(input: &Path, output: &Path, target: ImageTarget) -> MediaResult<()> {
    which::which("toktx").map_err(|_| MediaError::ToktxNotFound)?;

    let mut args: Vec<String> = flags_for(target).iter().map(|s| s.to_string()).collect();
    args.push(output.to_string_lossy().to_string());
    args.push(input.to_string_lossy().to_string());

    let output_status = Command::new("toktx")
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if output_status.status.success() {
        Ok(())
    } else {
        let message = String::from_utf8_lossy(&output_status.stderr).trim().to_string();
        let message = if message.is_empty() {
            "toktx exited with a non-zero status".to_string()
        } else {
            message
        };
        Err(MediaError::encode_failed(message, output_status.status.code()))
    }
}
