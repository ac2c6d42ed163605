use std::io::{self, Write};

pub fn write_stdout_text(text: &str) -> io::Result<()> {
    write_stdout(text, false)
}

pub fn write_stdout_line(text: &str) -> io::Result<()> {
    write_stdout(text, true)
}

fn write_stdout(text: &str, newline: bool) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    tolerate_broken_pipe(stdout.write_all(text.as_bytes()))?;
    if newline {
        tolerate_broken_pipe(stdout.write_all(b"\n"))?;
    }
    tolerate_broken_pipe(stdout.flush())
}

/// A reader that closed the pipe early (`| head`) is not a failure.
fn tolerate_broken_pipe(result: io::Result<()>) -> io::Result<()> {
    match result {
        Err(error) if error.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::tolerate_broken_pipe;

    #[test]
    fn broken_pipe_is_ignored_but_other_errors_are_not() {
        assert!(tolerate_broken_pipe(Err(io::Error::from(io::ErrorKind::BrokenPipe))).is_ok());
        assert!(tolerate_broken_pipe(Err(io::Error::from(io::ErrorKind::PermissionDenied))).is_err());
    }
}
