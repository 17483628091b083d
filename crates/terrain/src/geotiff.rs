//! Minimal single-band GeoTIFF reader.
//!
//! Parses classic (non-BigTIFF) files with strip layout, uncompressed or
//! deflate-compressed data, and a single sample per pixel. All sample
//! formats are widened to f32. Georeferencing comes from the
//! ModelPixelScale and ModelTiepoint tags plus the GeoKey directory.

use std::io::Read;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use flood_common::{CrsCode, FloodError, GridTransform};

/// Error types for GeoTIFF parsing.
#[derive(Debug, Error)]
pub enum GeoTiffError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a TIFF file: {0}")]
    BadMagic(String),

    #[error("Truncated file: {0}")]
    Truncated(String),

    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    #[error("Decompression failed: {0}")]
    Decompress(String),
}

impl From<GeoTiffError> for FloodError {
    fn from(err: GeoTiffError) -> Self {
        FloodError::TerrainUnavailable(err.to_string())
    }
}

/// A single-band elevation raster with native georeferencing.
#[derive(Debug, Clone)]
pub struct ElevationDataset {
    pub width: usize,
    pub height: usize,
    /// Elevation in meters, row-major, row 0 at the transform origin.
    pub data: Vec<f32>,
    pub transform: GridTransform,
    pub crs: CrsCode,
}

impl ElevationDataset {
    /// Open and fully decode a GeoTIFF elevation file.
    pub fn open(path: &Path) -> Result<Self, GeoTiffError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Decode a GeoTIFF from an in-memory buffer.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GeoTiffError> {
        let tiff = TiffReader::new(bytes)?;
        let ifd = tiff.read_ifd()?;

        let width = ifd.required_scalar(Tag::ImageWidth)? as usize;
        let height = ifd.required_scalar(Tag::ImageLength)? as usize;
        if width == 0 || height == 0 {
            return Err(GeoTiffError::Unsupported("empty raster".into()));
        }

        let samples_per_pixel = ifd.scalar(Tag::SamplesPerPixel).unwrap_or(1);
        if samples_per_pixel != 1 {
            return Err(GeoTiffError::Unsupported(format!(
                "expected single band, found {} samples per pixel",
                samples_per_pixel
            )));
        }

        let bits = ifd.scalar(Tag::BitsPerSample).unwrap_or(32) as u32;
        let sample_format = ifd.scalar(Tag::SampleFormat).unwrap_or(1) as u16;
        let compression = ifd.scalar(Tag::Compression).unwrap_or(1) as u16;

        let raw = Self::read_strips(&tiff, &ifd, compression, width, height, bits)?;
        let data = decode_samples(&raw, bits, sample_format, tiff.big_endian, width * height)?;

        let transform = Self::read_transform(&tiff, &ifd)?;
        let crs = Self::read_crs(&tiff, &ifd);

        Ok(Self {
            width,
            height,
            data,
            transform,
            crs,
        })
    }

    /// Bilinearly sample the dataset at fractional pixel coordinates.
    ///
    /// Returns `None` when the position is outside the raster.
    pub fn sample_bilinear(&self, col: f64, row: f64) -> Option<f32> {
        if col < -0.5
            || row < -0.5
            || col > self.width as f64 - 0.5
            || row > self.height as f64 - 0.5
        {
            return None;
        }

        let col = col.clamp(0.0, (self.width - 1) as f64);
        let row = row.clamp(0.0, (self.height - 1) as f64);

        let x1 = col.floor() as usize;
        let y1 = row.floor() as usize;
        let x2 = (x1 + 1).min(self.width - 1);
        let y2 = (y1 + 1).min(self.height - 1);

        let dx = (col - x1 as f64) as f32;
        let dy = (row - y1 as f64) as f32;

        let v11 = self.data[y1 * self.width + x1];
        let v21 = self.data[y1 * self.width + x2];
        let v12 = self.data[y2 * self.width + x1];
        let v22 = self.data[y2 * self.width + x2];

        let v1 = v11 * (1.0 - dx) + v21 * dx;
        let v2 = v12 * (1.0 - dx) + v22 * dx;
        Some(v1 * (1.0 - dy) + v2 * dy)
    }

    fn read_strips(
        tiff: &TiffReader<'_>,
        ifd: &Ifd,
        compression: u16,
        width: usize,
        height: usize,
        bits: u32,
    ) -> Result<Vec<u8>, GeoTiffError> {
        let offsets = ifd.values(Tag::StripOffsets)?;
        let counts = ifd.values(Tag::StripByteCounts)?;
        if offsets.len() != counts.len() || offsets.is_empty() {
            return Err(GeoTiffError::MissingTag("StripOffsets/StripByteCounts"));
        }

        let bytes_per_sample = (bits / 8) as usize;
        let expected = width * height * bytes_per_sample;
        let mut raw = Vec::with_capacity(expected);

        for (&offset, &count) in offsets.iter().zip(counts.iter()) {
            let strip = tiff.slice(offset as usize, count as usize)?;
            match compression {
                1 => raw.extend_from_slice(strip),
                8 => {
                    // Deflate (zlib-wrapped), as written by common tooling.
                    let mut decoder = flate2::read::ZlibDecoder::new(strip);
                    decoder
                        .read_to_end(&mut raw)
                        .map_err(|e| GeoTiffError::Decompress(e.to_string()))?;
                }
                other => {
                    return Err(GeoTiffError::Unsupported(format!(
                        "compression scheme {}",
                        other
                    )))
                }
            }
        }

        if raw.len() < expected {
            return Err(GeoTiffError::Truncated(format!(
                "strip data holds {} bytes, raster needs {}",
                raw.len(),
                expected
            )));
        }
        raw.truncate(expected);
        Ok(raw)
    }

    fn read_transform(tiff: &TiffReader<'_>, ifd: &Ifd) -> Result<GridTransform, GeoTiffError> {
        let scale = ifd.doubles(tiff, Tag::ModelPixelScale)?;
        let tiepoint = ifd.doubles(tiff, Tag::ModelTiepoint)?;
        if scale.len() < 2 || tiepoint.len() < 6 {
            return Err(GeoTiffError::MissingTag("ModelPixelScale/ModelTiepoint"));
        }

        // Tiepoint maps raster point (i, j) to model point (x, y); anchor
        // the origin back to pixel (0, 0).
        let (i, j) = (tiepoint[0], tiepoint[1]);
        let (x, y) = (tiepoint[3], tiepoint[4]);
        Ok(GridTransform {
            origin_x: x - i * scale[0],
            origin_y: y + j * scale[1],
            x_step: scale[0],
            y_step: -scale[1],
        })
    }

    fn read_crs(tiff: &TiffReader<'_>, ifd: &Ifd) -> CrsCode {
        // GeoKey directory: header of 4 shorts, then 4 shorts per key:
        // key id, tag location, count, value.
        let keys = match ifd.shorts(tiff, Tag::GeoKeyDirectory) {
            Ok(keys) if keys.len() >= 4 => keys,
            _ => {
                debug!("No GeoKey directory, assuming EPSG:4326");
                return CrsCode::Epsg4326;
            }
        };

        for entry in keys[4..].chunks_exact(4) {
            let (key, location, value) = (entry[0], entry[1], entry[3]);
            // GeographicTypeGeoKey or ProjectedCSTypeGeoKey, inline value.
            if (key == 2048 || key == 3072) && location == 0 {
                if let Some(crs) = CrsCode::from_epsg(value) {
                    return crs;
                }
                debug!(epsg = value, "Unrecognized CRS code, assuming EPSG:4326");
            }
        }
        CrsCode::Epsg4326
    }
}

/// Tags the reader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
enum Tag {
    ImageWidth = 256,
    ImageLength = 257,
    BitsPerSample = 258,
    Compression = 259,
    StripOffsets = 273,
    SamplesPerPixel = 277,
    StripByteCounts = 279,
    SampleFormat = 339,
    ModelPixelScale = 33550,
    ModelTiepoint = 33922,
    GeoKeyDirectory = 34735,
}

/// A parsed IFD entry: tag, field type, and inline or out-of-line values.
#[derive(Debug, Clone)]
struct IfdEntry {
    tag: u16,
    field_type: u16,
    count: u32,
    /// Raw 4-byte value/offset field.
    value_or_offset: u32,
    /// Values already decoded for inline SHORT/LONG entries.
    inline: Vec<u64>,
}

#[derive(Debug)]
struct Ifd {
    entries: Vec<IfdEntry>,
}

impl Ifd {
    fn find(&self, tag: Tag) -> Option<&IfdEntry> {
        self.entries.iter().find(|e| e.tag == tag as u16)
    }

    /// First value of a SHORT/LONG tag.
    fn scalar(&self, tag: Tag) -> Option<u64> {
        self.find(tag).and_then(|e| e.inline.first().copied())
    }

    fn required_scalar(&self, tag: Tag) -> Result<u64, GeoTiffError> {
        self.scalar(tag).ok_or(GeoTiffError::MissingTag(match tag {
            Tag::ImageWidth => "ImageWidth",
            Tag::ImageLength => "ImageLength",
            _ => "unknown",
        }))
    }

    /// All values of a SHORT/LONG tag (inline or already materialized).
    fn values(&self, tag: Tag) -> Result<&[u64], GeoTiffError> {
        self.find(tag)
            .map(|e| e.inline.as_slice())
            .ok_or(GeoTiffError::MissingTag("StripOffsets/StripByteCounts"))
    }

    /// DOUBLE array tag values.
    fn doubles(&self, tiff: &TiffReader<'_>, tag: Tag) -> Result<Vec<f64>, GeoTiffError> {
        let entry = self
            .find(tag)
            .ok_or(GeoTiffError::MissingTag("ModelPixelScale/ModelTiepoint"))?;
        if entry.field_type != 12 {
            return Err(GeoTiffError::Unsupported(format!(
                "tag {} has field type {}, expected DOUBLE",
                entry.tag, entry.field_type
            )));
        }
        let raw = tiff.slice(entry.value_or_offset as usize, entry.count as usize * 8)?;
        Ok(raw
            .chunks_exact(8)
            .map(|c| tiff.f64_from(c))
            .collect())
    }

    /// SHORT array tag values (possibly out-of-line).
    fn shorts(&self, tiff: &TiffReader<'_>, tag: Tag) -> Result<Vec<u16>, GeoTiffError> {
        let entry = self.find(tag).ok_or(GeoTiffError::MissingTag("GeoKeys"))?;
        if entry.count <= 2 {
            return Ok(entry.inline.iter().map(|&v| v as u16).collect());
        }
        let raw = tiff.slice(entry.value_or_offset as usize, entry.count as usize * 2)?;
        Ok(raw
            .chunks_exact(2)
            .map(|c| tiff.u16_from(c))
            .collect())
    }
}

/// Cursor over the raw TIFF bytes with header-declared endianness.
struct TiffReader<'a> {
    bytes: &'a [u8],
    big_endian: bool,
    first_ifd: usize,
}

impl<'a> TiffReader<'a> {
    fn new(bytes: &'a [u8]) -> Result<Self, GeoTiffError> {
        if bytes.len() < 8 {
            return Err(GeoTiffError::Truncated("header".into()));
        }
        let big_endian = match &bytes[0..2] {
            b"II" => false,
            b"MM" => true,
            other => {
                return Err(GeoTiffError::BadMagic(format!(
                    "byte order mark {:?}",
                    other
                )))
            }
        };
        let mut reader = Self {
            bytes,
            big_endian,
            first_ifd: 0,
        };
        if reader.u16_at(2)? != 42 {
            return Err(GeoTiffError::BadMagic("missing TIFF magic 42".into()));
        }
        reader.first_ifd = reader.u32_at(4)? as usize;
        Ok(reader)
    }

    fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8], GeoTiffError> {
        self.bytes
            .get(offset..offset + len)
            .ok_or_else(|| GeoTiffError::Truncated(format!("{} bytes at offset {}", len, offset)))
    }

    fn u16_at(&self, offset: usize) -> Result<u16, GeoTiffError> {
        Ok(self.u16_from(self.slice(offset, 2)?))
    }

    fn u32_at(&self, offset: usize) -> Result<u32, GeoTiffError> {
        Ok(self.u32_from(self.slice(offset, 4)?))
    }

    fn u16_from(&self, b: &[u8]) -> u16 {
        let arr = [b[0], b[1]];
        if self.big_endian {
            u16::from_be_bytes(arr)
        } else {
            u16::from_le_bytes(arr)
        }
    }

    fn u32_from(&self, b: &[u8]) -> u32 {
        let arr = [b[0], b[1], b[2], b[3]];
        if self.big_endian {
            u32::from_be_bytes(arr)
        } else {
            u32::from_le_bytes(arr)
        }
    }

    fn f64_from(&self, b: &[u8]) -> f64 {
        let arr: [u8; 8] = b.try_into().unwrap_or([0; 8]);
        if self.big_endian {
            f64::from_be_bytes(arr)
        } else {
            f64::from_le_bytes(arr)
        }
    }

    fn read_ifd(&self) -> Result<Ifd, GeoTiffError> {
        let count = self.u16_at(self.first_ifd)? as usize;
        let mut entries = Vec::with_capacity(count);

        for i in 0..count {
            let base = self.first_ifd + 2 + i * 12;
            let tag = self.u16_at(base)?;
            let field_type = self.u16_at(base + 2)?;
            let entry_count = self.u32_at(base + 4)?;
            let value_or_offset = self.u32_at(base + 8)?;

            let inline = self.entry_values(field_type, entry_count, value_or_offset, base + 8)?;
            entries.push(IfdEntry {
                tag,
                field_type,
                count: entry_count,
                value_or_offset,
                inline,
            });
        }

        Ok(Ifd { entries })
    }

    /// Materialize SHORT/LONG entry values, following the offset when the
    /// array does not fit in the 4-byte value field.
    fn entry_values(
        &self,
        field_type: u16,
        count: u32,
        value_or_offset: u32,
        value_field_offset: usize,
    ) -> Result<Vec<u64>, GeoTiffError> {
        let size = match field_type {
            3 => 2, // SHORT
            4 => 4, // LONG
            _ => return Ok(Vec::new()),
        };
        let total = size * count as usize;

        let raw = if total <= 4 {
            self.slice(value_field_offset, total)?
        } else {
            self.slice(value_or_offset as usize, total)?
        };

        Ok(raw
            .chunks_exact(size)
            .map(|c| match field_type {
                3 => self.u16_from(c) as u64,
                _ => self.u32_from(c) as u64,
            })
            .collect())
    }
}

/// Widen raw sample bytes to f32 according to bit depth and sample format.
fn decode_samples(
    raw: &[u8],
    bits: u32,
    sample_format: u16,
    big_endian: bool,
    count: usize,
) -> Result<Vec<f32>, GeoTiffError> {
    let read_u16 = |b: &[u8]| -> u16 {
        let arr = [b[0], b[1]];
        if big_endian {
            u16::from_be_bytes(arr)
        } else {
            u16::from_le_bytes(arr)
        }
    };
    let read_u32 = |b: &[u8]| -> u32 {
        let arr = [b[0], b[1], b[2], b[3]];
        if big_endian {
            u32::from_be_bytes(arr)
        } else {
            u32::from_le_bytes(arr)
        }
    };
    let read_u64 = |b: &[u8]| -> u64 {
        let arr: [u8; 8] = b.try_into().unwrap_or([0; 8]);
        if big_endian {
            u64::from_be_bytes(arr)
        } else {
            u64::from_le_bytes(arr)
        }
    };

    let data: Vec<f32> = match (bits, sample_format) {
        (8, 1) => raw.iter().take(count).map(|&b| b as f32).collect(),
        (8, 2) => raw.iter().take(count).map(|&b| b as i8 as f32).collect(),
        (16, 1) => raw
            .chunks_exact(2)
            .take(count)
            .map(|c| read_u16(c) as f32)
            .collect(),
        (16, 2) => raw
            .chunks_exact(2)
            .take(count)
            .map(|c| read_u16(c) as i16 as f32)
            .collect(),
        (32, 1) => raw
            .chunks_exact(4)
            .take(count)
            .map(|c| read_u32(c) as f32)
            .collect(),
        (32, 2) => raw
            .chunks_exact(4)
            .take(count)
            .map(|c| read_u32(c) as i32 as f32)
            .collect(),
        (32, 3) => raw
            .chunks_exact(4)
            .take(count)
            .map(|c| f32::from_bits(read_u32(c)))
            .collect(),
        (64, 3) => raw
            .chunks_exact(8)
            .take(count)
            .map(|c| f64::from_bits(read_u64(c)) as f32)
            .collect(),
        (bits, fmt) => {
            return Err(GeoTiffError::Unsupported(format!(
                "sample layout: {} bits, format {}",
                bits, fmt
            )))
        }
    };

    if data.len() < count {
        return Err(GeoTiffError::Truncated(format!(
            "decoded {} samples, raster needs {}",
            data.len(),
            count
        )));
    }
    Ok(data)
}
