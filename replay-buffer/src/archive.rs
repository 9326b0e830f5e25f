use std::fs::File;
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use go::{board_sq, policy_size, Game, Move, Step};

use super::error::ArchiveError;

const MOVES_TAG: u8 = b'G';
const PROBABILITIES_TAG: u8 = b'P';
const GAME_MAGIC: u8 = b'g';

type Result<T> = std::result::Result<T, ArchiveError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// Only moves are stored; each step's distribution is one-hot on the move played.
    Moves,
    /// Every step carries the full move probability vector.
    Probabilities,
}

impl ArchiveFormat {
    pub fn tag(&self) -> u8 {
        match self {
            ArchiveFormat::Moves => MOVES_TAG,
            ArchiveFormat::Probabilities => PROBABILITIES_TAG,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            MOVES_TAG => Ok(ArchiveFormat::Moves),
            PROBABILITIES_TAG => Ok(ArchiveFormat::Probabilities),
            tag => Err(ArchiveError::BadFormatTag(tag)),
        }
    }
}

/// Sequential decoder over an archive stream. Every field's position depends on all
/// fields before it, so games can only be read in order.
pub struct ArchiveReader<R> {
    reader: OffsetReader<R>,
    format: ArchiveFormat,
    board_size: usize,
    done: bool,
}

impl ArchiveReader<Box<dyn Read + Send>> {
    /// Opens an archive file. Files ending in `.gz` are decompressed on the fly.
    pub fn open(path: impl AsRef<Path>, board_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;

        let reader: Box<dyn Read + Send> = if is_gzip(path) {
            Box::new(BufReader::new(GzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };

        Self::new(reader, board_size)
    }
}

impl<R: Read> ArchiveReader<R> {
    /// Reads the format tag. A bad tag fails here, before any game is decoded.
    pub fn new(reader: R, board_size: usize) -> Result<Self> {
        let mut reader = OffsetReader::new(reader);
        let tag = reader.field("format tag", |r| r.read_u8())?;
        let format = ArchiveFormat::from_tag(tag)?;

        Ok(Self {
            reader,
            format,
            board_size,
            done: false,
        })
    }

    pub fn format(&self) -> ArchiveFormat {
        self.format
    }

    /// Bytes consumed from the underlying stream so far.
    pub fn offset(&self) -> u64 {
        self.reader.offset
    }

    /// Decodes the next game. `Ok(None)` only when the stream ends exactly on a game
    /// boundary. Once an error has been returned the reader yields nothing more.
    pub fn next_game(&mut self) -> Result<Option<Game>> {
        if self.done {
            return Ok(None);
        }

        let res = self.read_game();

        if !matches!(res, Ok(Some(_))) {
            self.done = true;
        }

        res
    }

    fn read_game(&mut self) -> Result<Option<Game>> {
        let offset = self.reader.offset;
        let magic = match self.reader.read_byte_or_eof()? {
            Some(magic) => magic,
            None => return Ok(None),
        };

        if magic != GAME_MAGIC {
            return Err(ArchiveError::BadGameMagic {
                offset,
                byte: magic,
            });
        }

        let offset = self.reader.offset;
        let result = self.reader.field("game result", |r| r.read_i8())?;
        if !(-1..=1).contains(&result) {
            return Err(ArchiveError::BadResult { offset, result });
        }

        let num_steps = self
            .reader
            .field("step count", |r| r.read_u16::<LittleEndian>())?;

        let mut steps = Vec::with_capacity(num_steps as usize);
        for _ in 0..num_steps {
            steps.push(self.read_step()?);
        }

        Ok(Some(Game::new(result, steps)))
    }

    fn read_step(&mut self) -> Result<Step> {
        let offset = self.reader.offset;
        let field = self
            .reader
            .field("move", |r| r.read_i16::<LittleEndian>())?;

        // Positive fields are `position + 1`. Negative fields are `-(position + 1)` and
        // announce a capture list.
        let (position, has_captures) = match field {
            f if f > 0 => (f as usize - 1, false),
            f if f < 0 => ((-(f as i32) - 1) as usize, true),
            _ => return Err(ArchiveError::BadMove { offset, field }),
        };

        let action = Move::from_position(position, self.board_size)
            .ok_or(ArchiveError::BadMove { offset, field })?;

        let captures = if has_captures {
            self.read_captures()?
        } else {
            vec![]
        };

        match self.format {
            ArchiveFormat::Moves => Ok(Step::one_hot(action, captures, self.board_size)),
            ArchiveFormat::Probabilities => {
                let mut probabilities = vec![0.0; policy_size(self.board_size)];
                self.reader.field("probabilities", |r| {
                    r.read_f32_into::<LittleEndian>(&mut probabilities)
                })?;

                Ok(Step::new(action, captures, probabilities))
            }
        }
    }

    fn read_captures(&mut self) -> Result<Vec<u16>> {
        let board_sq = board_sq(self.board_size);
        let num_captures = self
            .reader
            .field("capture count", |r| r.read_u16::<LittleEndian>())?;

        let mut captures = Vec::with_capacity(num_captures as usize);
        for _ in 0..num_captures {
            let offset = self.reader.offset;
            let position = self
                .reader
                .field("capture position", |r| r.read_u16::<LittleEndian>())?;

            if position as usize >= board_sq {
                return Err(ArchiveError::BadCapture { offset, position });
            }

            captures.push(position);
        }

        Ok(captures)
    }
}

impl<R: Read> Iterator for ArchiveReader<R> {
    type Item = Result<Game>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_game().transpose()
    }
}

pub struct ArchiveWriter<W: Write> {
    writer: W,
    format: ArchiveFormat,
    board_size: usize,
}

/// Output of a finished archive. `complete` writes whatever trailer the stream needs
/// and flushes, reporting any error instead of leaving it to `Drop`.
pub trait ArchiveSink: Write {
    fn complete(&mut self) -> io::Result<()> {
        self.flush()
    }
}

impl ArchiveSink for Vec<u8> {}

impl<W: Write> ArchiveSink for BufWriter<W> {}

impl<W: Write> ArchiveSink for GzEncoder<W> {
    fn complete(&mut self) -> io::Result<()> {
        self.try_finish()?;
        self.get_mut().flush()
    }
}

/// An archive file on disk, gzip compressed when its path ends in `.gz`.
pub enum ArchiveFile {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl Write for ArchiveFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            ArchiveFile::Plain(w) => w.write(buf),
            ArchiveFile::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            ArchiveFile::Plain(w) => w.flush(),
            ArchiveFile::Gzip(w) => w.flush(),
        }
    }
}

impl ArchiveSink for ArchiveFile {
    fn complete(&mut self) -> io::Result<()> {
        match self {
            ArchiveFile::Plain(w) => w.complete(),
            ArchiveFile::Gzip(w) => w.complete(),
        }
    }
}

impl ArchiveWriter<ArchiveFile> {
    /// Creates an archive file, gzip compressed when the path ends in `.gz`.
    /// The file is only a valid archive once [`ArchiveWriter::finish`] has returned.
    pub fn create(path: impl AsRef<Path>, format: ArchiveFormat, board_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = BufWriter::new(File::create(path)?);

        let writer = if is_gzip(path) {
            ArchiveFile::Gzip(GzEncoder::new(file, Compression::default()))
        } else {
            ArchiveFile::Plain(file)
        };

        Self::new(writer, format, board_size)
    }
}

impl<W: Write> ArchiveWriter<W> {
    pub fn new(mut writer: W, format: ArchiveFormat, board_size: usize) -> Result<Self> {
        writer.write_u8(format.tag())?;

        Ok(Self {
            writer,
            format,
            board_size,
        })
    }

    pub fn write_game(&mut self, game: &Game) -> Result<()> {
        self.validate(game)?;

        self.writer.write_u8(GAME_MAGIC)?;
        self.writer.write_i8(game.result())?;
        self.writer.write_u16::<LittleEndian>(game.len() as u16)?;

        for step in game.steps() {
            let field = (step.action.position(self.board_size) + 1) as i16;

            if step.captures.is_empty() {
                self.writer.write_i16::<LittleEndian>(field)?;
            } else {
                self.writer.write_i16::<LittleEndian>(-field)?;
                self.writer
                    .write_u16::<LittleEndian>(step.captures.len() as u16)?;
                for &capture in &step.captures {
                    self.writer.write_u16::<LittleEndian>(capture)?;
                }
            }

            if self.format == ArchiveFormat::Probabilities {
                for &probability in &step.probabilities {
                    self.writer.write_f32::<LittleEndian>(probability)?;
                }
            }
        }

        Ok(())
    }

    fn validate(&self, game: &Game) -> Result<()> {
        let board_sq = board_sq(self.board_size);

        if !(-1..=1).contains(&game.result()) {
            return Err(ArchiveError::Unwritable(format!(
                "result {} is not one of -1, 0, 1",
                game.result()
            )));
        }

        if game.len() > u16::MAX as usize {
            return Err(ArchiveError::Unwritable(format!(
                "{} steps do not fit the step count",
                game.len()
            )));
        }

        for (idx, step) in game.steps().iter().enumerate() {
            if let Move::Place(vertex) = step.action {
                if vertex >= board_sq {
                    return Err(ArchiveError::Unwritable(format!(
                        "step {} places a stone off the board at {}",
                        idx, vertex
                    )));
                }
            }

            if step.captures.len() > u16::MAX as usize
                || step.captures.iter().any(|&c| c as usize >= board_sq)
            {
                return Err(ArchiveError::Unwritable(format!(
                    "step {} has an invalid capture list",
                    idx
                )));
            }

            if self.format == ArchiveFormat::Probabilities
                && step.probabilities.len() != policy_size(self.board_size)
            {
                return Err(ArchiveError::Unwritable(format!(
                    "step {} has {} probabilities",
                    idx,
                    step.probabilities.len()
                )));
            }
        }

        Ok(())
    }
}

impl<W: ArchiveSink> ArchiveWriter<W> {
    /// Completes the stream, gzip trailer included, and hands back the sink.
    pub fn finish(mut self) -> Result<W> {
        self.writer.complete()?;
        Ok(self.writer)
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

/// Tracks how many bytes have been consumed so that errors can point at the offending field.
struct OffsetReader<R> {
    inner: R,
    offset: u64,
}

impl<R: Read> OffsetReader<R> {
    fn new(inner: R) -> Self {
        Self { inner, offset: 0 }
    }

    /// Reads one field. Running out of bytes part way through is a truncated archive.
    fn field<T, F>(&mut self, field: &'static str, read: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> io::Result<T>,
    {
        let offset = self.offset;
        read(self).map_err(|err| match err.kind() {
            ErrorKind::UnexpectedEof => ArchiveError::Truncated { offset, field },
            _ => ArchiveError::Io(err),
        })
    }

    /// Reads a single byte, distinguishing a clean end of stream from data. A stream
    /// that reports a premature end here, like a gzip file missing its trailer, is
    /// truncated.
    fn read_byte_or_eof(&mut self) -> Result<Option<u8>> {
        let offset = self.offset;
        let mut buf = [0u8; 1];
        loop {
            match self.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                    return Err(ArchiveError::Truncated {
                        offset,
                        field: "game magic",
                    })
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

impl<R: Read> Read for OffsetReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.offset += read as u64;
        Ok(read)
    }
}
