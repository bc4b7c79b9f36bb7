use std::{
    fs::{File, OpenOptions},
    io::{self, BufRead, BufReader, Write},
    path::Path,
    sync::Arc,
};

use parking_lot::Mutex;

pub fn strip_ansi_escapes(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' {
            in_escape = true;
        } else if in_escape {
            if c.is_ascii_alphabetic() {
                in_escape = false;
            }
        } else {
            result.push(c);
        }
    }
    result
}

/// Appends to a log file and trims it back to the newest `max_lines` lines
/// every so often.
#[derive(Clone)]
pub(crate) struct LineCappedWriter {
    path: String,
    max_lines: u32,
    pending_lines: Arc<Mutex<u32>>,
}

impl LineCappedWriter {
    pub fn new(path: String, max_lines: u32) -> Self {
        Self {
            path,
            max_lines,
            pending_lines: Arc::new(Mutex::new(0)),
        }
    }

    fn trim_threshold(&self) -> u32 {
        (self.max_lines / 10).max(50)
    }

    fn trim(&self) -> io::Result<()> {
        if !Path::new(&self.path).exists() {
            return Ok(());
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let lines: Vec<String> = reader.lines().collect::<Result<_, _>>()?;

        let cap = self.max_lines as usize;
        if lines.len() > cap {
            let mut file = File::create(&self.path)?;
            for line in &lines[lines.len() - cap..] {
                writeln!(file, "{}", line)?;
            }
        }
        Ok(())
    }
}

impl io::Write for LineCappedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?
            .write_all(buf)?;

        let mut pending = self.pending_lines.lock();
        *pending += buf.iter().filter(|&&b| b == b'\n').count() as u32;
        if *pending >= self.trim_threshold() {
            if let Err(e) = self.trim() {
                eprintln!("Failed to trim log file: {}", e);
            }
            *pending = 0;
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LineCappedWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
