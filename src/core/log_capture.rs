//! Collects formatted `tracing` output of a closure for assertions.

use std::{
    io,
    sync::{Arc, Mutex},
};

use tracing::Level;

#[derive(Clone, Default)]
struct Sink(Arc<Mutex<Vec<u8>>>);

impl io::Write for Sink
{
    fn write(
        &mut self,
        buf: &[u8],
    ) -> io::Result<usize>
    {
        self.0
            .lock()
            .map_err(|_| io::Error::other("log sink poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()>
    {
        Ok(())
    }
}

/// Run `f` under a plain-text subscriber at `level` and return its result
/// together with every line it logged.
pub fn capture<T>(
    level: Level,
    f: impl FnOnce() -> T,
) -> (T, Vec<String>)
{
    let sink = Sink::default();
    let writer = sink.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .without_time()
        .with_writer(move || writer.clone())
        .finish();

    let out = tracing::subscriber::with_default(subscriber, f);
    let bytes = sink
        .0
        .lock()
        .map(|b| b.clone())
        .unwrap_or_default();
    let lines = String::from_utf8_lossy(&bytes)
        .lines()
        .map(str::to_string)
        .collect();
    (out, lines)
}
