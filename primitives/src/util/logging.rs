use slog::{o, Drain, Level, Logger, OwnedKVList, Record, KV};
use slog_term::{
    timestamp_local, CompactFormatSerializer, CountingWriter, Decorator, RecordDecorator,
    Serializer, ThreadSafeTimestampFn,
};
use std::cell::RefCell;
use std::{io, io::Write};

pub use slog_async::Async;
pub use slog_term::TermDecorator;

/// Builds the application logger: an asynchronous, prefixed-compact drain
/// writing to the terminal, filtered by `LOG_LEVEL` (defaults to `info`).
pub fn new_logger(prefix: &str) -> Logger {
    let level = std::env::var("LOG_LEVEL")
        .ok()
        .and_then(|level| level.parse().ok())
        .unwrap_or(Level::Info);

    let decorator = TermDecorator::new().build();
    let drain = PrefixedCompactFormat::new(prefix, decorator).fuse();
    let drain = slog::LevelFilter::new(drain, level).fuse();
    let drain = Async::new(drain).build().fuse();

    Logger::root(drain, o!())
}

/// A logger that discards everything written to it, for tests that don't
/// care about log output.
pub fn discard_logger() -> Logger {
    Logger::root(slog::Discard, o!())
}

pub struct PrefixedCompactFormat<D>
where
    D: Decorator,
{
    decorator: D,
    history: RefCell<Vec<(Vec<u8>, Vec<u8>)>>,
    fn_timestamp: Box<dyn ThreadSafeTimestampFn<Output = io::Result<()>>>,
    prefix: String,
}

impl<D> Drain for PrefixedCompactFormat<D>
where
    D: Decorator,
{
    type Ok = ();
    type Err = io::Error;

    fn log(&self, record: &Record<'_>, values: &OwnedKVList) -> Result<Self::Ok, Self::Err> {
        self.format_compact(record, values)
    }
}

impl<D> PrefixedCompactFormat<D>
where
    D: Decorator,
{
    pub fn new(prefix: &str, d: D) -> PrefixedCompactFormat<D> {
        Self {
            fn_timestamp: Box::new(timestamp_local),
            decorator: d,
            history: RefCell::new(vec![]),
            prefix: prefix.to_owned(),
        }
    }

    fn format_compact(&self, record: &Record<'_>, values: &OwnedKVList) -> io::Result<()> {
        self.decorator.with_record(record, values, |decorator| {
            let indent = {
                let mut history_ref = self.history.borrow_mut();
                let mut serializer = CompactFormatSerializer::new(decorator, &mut *history_ref);

                values.serialize(record, &mut serializer)?;

                serializer.finish()?
            };

            decorator.start_whitespace()?;

            for _ in 0..indent {
                write!(decorator, " ")?;
            }

            let comma_needed =
                print_msg_header(&self.prefix, &*self.fn_timestamp, decorator, record)?;
            {
                let mut serializer = Serializer::new(decorator, comma_needed, false);

                record.kv().serialize(record, &mut serializer)?;

                serializer.finish()?;
            }

            decorator.start_whitespace()?;
            writeln!(decorator)?;

            decorator.flush()?;

            Ok(())
        })
    }
}

pub fn print_msg_header(
    prefix: &str,
    fn_timestamp: &dyn ThreadSafeTimestampFn<Output = io::Result<()>>,
    mut rd: &mut dyn RecordDecorator,
    record: &Record<'_>,
) -> io::Result<bool> {
    rd.start_timestamp()?;
    fn_timestamp(&mut rd)?;

    rd.start_whitespace()?;
    write!(rd, " ")?;

    rd.start_level()?;
    write!(rd, "{}", record.level().as_short_str())?;

    rd.start_whitespace()?;
    write!(rd, " ")?;

    rd.start_msg()?;
    write!(rd, "{}:", prefix)?;

    rd.start_whitespace()?;
    write!(rd, " ")?;

    rd.start_msg()?;
    let mut count_rd = CountingWriter::new(&mut rd);
    write!(count_rd, "{}", record.msg())?;
    Ok(count_rd.count() != 0)
}
