use crate::source::{read_fault, ByteSource};
use crate::{SampleFormat, WavError, WavSpecs};
use winnow::binary::{le_u16, le_u32};
use winnow::combinator::opt;
use winnow::token::literal;
use winnow::{ModalResult, Parser};

/// "RIFF" + size + "WAVEfmt "
const RIFF_HEADER_SIZE: usize = 16;

/// Largest fmt chunk layout this parser knows: WAVEFORMATEX with cbSize.
const MAX_FMT_CHUNK_SIZE: usize = 18;

/// wFormatTag of uncompressed linear PCM.
const WAVE_FORMAT_PCM: u16 = 0x01;

/// RIFFチャンクの情報
/// * 'size' - ファイルサイズ(byte)-8. Not validated.
#[derive(Debug)]
struct RiffHeader {
    size: u32,
}

/// Contents of the fmt chunk.
/// * 'extra_params' - cbSize, only present in 18 byte fmt chunks.
#[derive(Debug, Clone, Copy)]
struct WaveFormatChunk {
    audio_format: u16,
    num_channels: u16,
    sample_rate: u32,
    #[allow(dead_code)]
    byte_rate: u32,
    #[allow(dead_code)]
    block_align: u16,
    bits_per_sample: u16,
    extra_params: Option<u16>,
}

/// Result of parsing everything before the sample data.
/// * 'data_length' - Length of the data chunk payload in bytes.
/// * 'data_start' - Offset of the first sample byte in the source.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WavHeader {
    pub specs: WavSpecs,
    pub data_length: u32,
    pub data_start: u32,
}

/// ファイルがRIFFから始まり、識別子がWAVEでfmtチャンクが続くことのチェック
fn parse_riff_header(input: &mut &[u8]) -> ModalResult<RiffHeader> {
    (literal(b"RIFF"), le_u32, literal(b"WAVEfmt "))
        .map(|(_, size, _)| RiffHeader { size })
        .parse_next(input)
}

/// WAVはLittleEndianしか使わない.
/// 16 byte (PCMWAVEFORMAT) or 18 byte (WAVEFORMATEX) fmt chunk.
fn parse_fmt(input: &mut &[u8]) -> ModalResult<WaveFormatChunk> {
    (
        le_u16,
        le_u16,
        le_u32,
        le_u32,
        le_u16,
        le_u16,
        opt(le_u16),
    )
        .map(
            |(
                audio_format,
                num_channels,
                sample_rate,
                byte_rate,
                block_align,
                bits_per_sample,
                extra_params,
            )| WaveFormatChunk {
                audio_format,
                num_channels,
                sample_rate,
                byte_rate,
                block_align,
                bits_per_sample,
                extra_params,
            },
        )
        .parse_next(input)
}

impl WaveFormatChunk {
    fn validate(&self) -> Result<WavSpecs, WavError> {
        if self.audio_format != WAVE_FORMAT_PCM
            || self.num_channels != 1
            || self.extra_params.unwrap_or(0) != 0
        {
            return Err(WavError::UnsupportedFormat);
        }

        let sample_format = match self.bits_per_sample {
            8 => SampleFormat::U8,
            16 => SampleFormat::I16,
            _ => return Err(WavError::UnsupportedFormat),
        };

        Ok(WavSpecs {
            sample_format,
            num_channels: self.num_channels,
            sample_rate: self.sample_rate,
        })
    }
}

/// Read exactly `buf.len()` bytes. A short read is reported as `short`.
fn read_exact<S: ByteSource>(
    source: &mut S,
    buf: &mut [u8],
    short: WavError,
) -> Result<(), WavError> {
    let n = source.read(buf).map_err(read_fault)?;
    if n != buf.len() {
        return Err(short);
    }
    Ok(())
}

/// Parse the RIFF header, the fmt chunk and the data chunk header.
/// On success the source is positioned at the first sample byte.
///
/// The data chunk must directly follow the fmt chunk.
pub(crate) fn read_header<S: ByteSource>(source: &mut S) -> Result<WavHeader, WavError> {
    source.rewind().map_err(read_fault)?;

    let mut riff = [0u8; RIFF_HEADER_SIZE];
    read_exact(source, &mut riff, WavError::MalformedHeader)?;
    let riff = parse_riff_header
        .parse_next(&mut &riff[..])
        .map_err(|_| WavError::MalformedHeader)?;
    log::debug!("RIFF chunk size: {}", riff.size);

    let mut size = [0u8; 4];
    read_exact(source, &mut size, WavError::MalformedHeader)?;
    let fmt_size = u32::from_le_bytes(size) as usize;
    if fmt_size > MAX_FMT_CHUNK_SIZE {
        log::debug!("fmt chunk too large: {} bytes", fmt_size);
        return Err(WavError::MalformedHeader);
    }

    let mut fmt = [0u8; MAX_FMT_CHUNK_SIZE];
    read_exact(source, &mut fmt[..fmt_size], WavError::SourceRead)?;
    let format = parse_fmt
        .parse_next(&mut &fmt[..fmt_size])
        .map_err(|_| WavError::MalformedHeader)?;
    log::debug!("fmt chunk: {:?}", format);
    let specs = format.validate()?;

    let mut tag = [0u8; 4];
    read_exact(source, &mut tag, WavError::MalformedHeader)?;
    if &tag != b"data" {
        log::debug!("expected data chunk, found {:?}", tag);
        return Err(WavError::MalformedHeader);
    }

    let mut length = [0u8; 4];
    read_exact(source, &mut length, WavError::MalformedHeader)?;
    let data_length = u32::from_le_bytes(length);
    let data_start = source.position().map_err(read_fault)?;

    log::debug!(
        "wav specs: {:?}, data: {} bytes at offset {}",
        specs,
        data_length,
        data_start
    );

    Ok(WavHeader {
        specs,
        data_length,
        data_start,
    })
}
