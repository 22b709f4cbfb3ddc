use super::process::run;
use super::{MediaError, MediaResult};
use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

/// Container duration of `path` in seconds, as reported by ffprobe.
pub async fn probe_duration(
    ffprobe_bin: &str,
    path: &Path,
    timeout: Option<Duration>,
) -> MediaResult<f64> {
    let args: Vec<OsString> = vec![
        "-v".into(),
        "error".into(),
        "-show_entries".into(),
        "format=duration".into(),
        "-of".into(),
        "default=noprint_wrappers=1:nokey=1".into(),
        path.as_os_str().to_owned(),
    ];
    let output = run(ffprobe_bin, &args, timeout).await?;
    parse_duration(&String::from_utf8_lossy(&output.stdout))
}

pub(crate) fn parse_duration(raw: &str) -> MediaResult<f64> {
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs >= 0.0 => Ok(secs),
        _ => Err(MediaError::InvalidDuration(trimmed.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_seconds() {
        assert_eq!(parse_duration("10.010000\n").unwrap(), 10.01);
    }

    #[test]
    fn rejects_unknown_duration() {
        assert!(matches!(
            parse_duration("N/A\n"),
            Err(MediaError::InvalidDuration(s)) if s == "N/A"
        ));
        assert!(parse_duration("").is_err());
    }
}
