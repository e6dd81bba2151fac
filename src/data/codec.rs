//! Binary genome format.
//!
//! Layout (little endian, every count precedes the data it sizes):
//!
//! ```text
//! magic "CGNM" | version u32
//! child_depth u32 | per slot: present u8, [blob_len u32, blob]
//! levels u32 | per level: types u32 | per type:
//!     rank u32, dims_len u32, dims u32*, range_begin u32, range_end u32,
//!     space_len u32, space u32*, num_layers u32, nodes_per_layer u32,
//!     stepfactor f64, transfer_width f64
//! extra_answer_turns u32 | num_perturb_runs u32 | perturb_chance f64 | perturb_factor f64
//! default template: one convolution record in the layout above
//! ```
//!
//! The template is only checked for structure, not against the bounds.

use crate::config::BoundsConfig;
use crate::engines::generation::{ClusterParams, Genome};
use crate::error::{GenomeError, Result};
use crate::types::ConvolutionProperties;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

pub const MAGIC: [u8; 4] = *b"CGNM";
pub const SCHEMA_VERSION: u32 = 2;

/// Upper limit on input-space rank accepted from a stream.
const MAX_INPUT_SPACE_RANK: usize = 64;

fn to_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| GenomeError::Format(format!("{what} {value} does not fit in 32 bits")))
}

/// Write `genome` to `writer` in the binary genome format.
pub fn encode<P: ClusterParams, W: Write>(genome: &Genome<P>, writer: &mut W) -> Result<()> {
    writer.write_all(&MAGIC)?;
    writer.write_u32::<LittleEndian>(SCHEMA_VERSION)?;

    writer.write_u32::<LittleEndian>(to_u32(genome.child_depth(), "child depth")?)?;
    for slot in genome.cluster_slots() {
        match slot {
            Some(params) => {
                let blob = params.to_bytes();
                writer.write_u8(1)?;
                writer.write_u32::<LittleEndian>(to_u32(blob.len(), "cluster blob length")?)?;
                writer.write_all(&blob)?;
            }
            None => writer.write_u8(0)?,
        }
    }

    writer.write_u32::<LittleEndian>(to_u32(genome.num_convolution_layers(), "level count")?)?;
    for (types, &count) in genome
        .convolution_topology()
        .iter()
        .zip(genome.num_convolution_types())
    {
        writer.write_u32::<LittleEndian>(to_u32(count, "type count")?)?;
        for props in types {
            encode_convolution(props, writer)?;
        }
    }

    writer.write_u32::<LittleEndian>(to_u32(genome.extra_answer_turns(), "extra answer turns")?)?;
    writer.write_u32::<LittleEndian>(to_u32(genome.num_perturb_runs(), "perturb runs")?)?;
    writer.write_f64::<LittleEndian>(genome.perturb_chance())?;
    writer.write_f64::<LittleEndian>(genome.perturb_factor())?;
    encode_convolution(genome.default_conv_prop(), writer)?;
    Ok(())
}

fn encode_convolution<W: Write>(props: &ConvolutionProperties, writer: &mut W) -> Result<()> {
    writer.write_u32::<LittleEndian>(to_u32(props.rank, "rank")?)?;
    writer.write_u32::<LittleEndian>(to_u32(props.dimensions.len(), "dimension count")?)?;
    for &dim in &props.dimensions {
        writer.write_u32::<LittleEndian>(to_u32(dim, "dimension")?)?;
    }
    writer.write_u32::<LittleEndian>(to_u32(props.input_range_begin, "input range begin")?)?;
    writer.write_u32::<LittleEndian>(to_u32(props.input_range_end, "input range end")?)?;
    writer.write_u32::<LittleEndian>(to_u32(props.input_space_dimensions.len(), "input space rank")?)?;
    for &dim in &props.input_space_dimensions {
        writer.write_u32::<LittleEndian>(to_u32(dim, "input space dimension")?)?;
    }
    writer.write_u32::<LittleEndian>(to_u32(props.num_layers, "node layers")?)?;
    writer.write_u32::<LittleEndian>(to_u32(props.nodes_per_layer, "nodes per layer")?)?;
    writer.write_f64::<LittleEndian>(props.stepfactor)?;
    writer.write_f64::<LittleEndian>(props.transfer_width)?;
    Ok(())
}

/// Serialize `genome` into a fresh buffer.
pub fn save<P: ClusterParams>(genome: &Genome<P>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode(genome, &mut buf)?;
    Ok(buf)
}

struct StreamReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> StreamReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { cursor: Cursor::new(bytes) }
    }

    fn remaining(&self) -> usize {
        let len = self.cursor.get_ref().len();
        len.saturating_sub(self.cursor.position() as usize)
    }

    fn truncated(what: &str) -> GenomeError {
        GenomeError::Format(format!("stream truncated while reading {what}"))
    }

    fn u8(&mut self, what: &str) -> Result<u8> {
        self.cursor.read_u8().map_err(|_| Self::truncated(what))
    }

    fn u32(&mut self, what: &str) -> Result<usize> {
        self.cursor
            .read_u32::<LittleEndian>()
            .map(|v| v as usize)
            .map_err(|_| Self::truncated(what))
    }

    fn f64(&mut self, what: &str) -> Result<f64> {
        self.cursor
            .read_f64::<LittleEndian>()
            .map_err(|_| Self::truncated(what))
    }

    fn bytes(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(Self::truncated(what));
        }
        let start = self.cursor.position() as usize;
        let data: &'a [u8] = *self.cursor.get_ref();
        self.cursor.set_position((start + len) as u64);
        Ok(&data[start..start + len])
    }

    fn u32_vec(&mut self, len: usize, what: &str) -> Result<Vec<usize>> {
        if self.remaining() < len.saturating_mul(4) {
            return Err(Self::truncated(what));
        }
        (0..len).map(|_| self.u32(what)).collect()
    }

    fn expect_magic(&mut self) -> Result<()> {
        let mut magic = [0u8; 4];
        self.cursor
            .read_exact(&mut magic)
            .map_err(|_| Self::truncated("magic"))?;
        if magic != MAGIC {
            return Err(GenomeError::Format("not a genome stream (bad magic)".to_string()));
        }
        Ok(())
    }
}

fn check_count(what: &str, value: usize, min: usize, max: usize) -> Result<()> {
    if value < min || value > max {
        return Err(GenomeError::Range(format!("{what} {value} outside [{min}, {max}]")));
    }
    Ok(())
}

/// Rebuild a genome from `bytes` and check it against `bounds`.
///
/// Malformed or truncated input fails with [`GenomeError::Format`]; values
/// outside the current bounds fail with [`GenomeError::Range`]. Nothing is
/// clamped, and no genome is returned on error.
pub fn load<P: ClusterParams>(bytes: &[u8], bounds: &BoundsConfig) -> Result<Genome<P>> {
    let mut reader = StreamReader::new(bytes);

    reader.expect_magic()?;
    let version = reader.u32("version")?;
    if version != SCHEMA_VERSION as usize {
        return Err(GenomeError::Format(format!(
            "unsupported genome schema version {} (expected {})",
            version, SCHEMA_VERSION
        )));
    }

    let child_depth = reader.u32("child depth")?;
    if child_depth != bounds.child_depth {
        return Err(GenomeError::Range(format!(
            "stream has child depth {}, bounds require {}",
            child_depth, bounds.child_depth
        )));
    }
    let mut genome = Genome::<P>::new(child_depth);
    for index in 0..child_depth {
        let params = match reader.u8("cluster slot flag")? {
            0 => None,
            1 => {
                let len = reader.u32("cluster blob length")?;
                let blob = reader.bytes(len, "cluster parameter blob")?;
                Some(P::from_bytes(blob)?)
            }
            other => {
                return Err(GenomeError::Format(format!(
                    "invalid presence flag {} for cluster slot {}",
                    other, index
                )))
            }
        };
        genome.set_cluster_slot(index, params)?;
    }

    let num_levels = reader.u32("level count")?;
    check_count(
        "convolution levels",
        num_levels,
        bounds.min_convolution_levels,
        bounds.max_convolution_levels,
    )?;
    for level in 0..num_levels {
        let num_types = reader.u32("type count")?;
        check_count(
            "convolutions per level",
            num_types,
            bounds.min_convolutions,
            bounds.max_convolutions,
        )?;
        let types = (0..num_types)
            .map(|_| decode_convolution(&mut reader, bounds))
            .collect::<Result<Vec<_>>>()?;
        log::trace!("Decoded level {} with {} types", level, types.len());
        genome.push_level(types);
    }

    {
        let scalars = genome.scalars_mut();
        *scalars.extra_answer_turns = reader.u32("extra answer turns")?;
        *scalars.num_perturb_runs = reader.u32("perturb runs")?;
        *scalars.perturb_chance = reader.f64("perturb chance")?;
        *scalars.perturb_factor = reader.f64("perturb factor")?;
    }

    let template = decode_record(&mut reader, |rank| {
        if rank > MAX_INPUT_SPACE_RANK {
            return Err(GenomeError::Format(format!("invalid template rank {}", rank)));
        }
        Ok(())
    })?;
    genome.set_default_conv_prop(template)?;

    if reader.remaining() != 0 {
        return Err(GenomeError::Format(format!(
            "{} trailing bytes after genome",
            reader.remaining()
        )));
    }

    match genome.validate(bounds) {
        Ok(()) => Ok(genome),
        Err(GenomeError::StructuralInvariant(msg)) => Err(GenomeError::Format(msg)),
        Err(e) => Err(e),
    }
}

fn decode_convolution(reader: &mut StreamReader<'_>, bounds: &BoundsConfig) -> Result<ConvolutionProperties> {
    decode_record(reader, |rank| {
        check_count(
            "convolution rank",
            rank,
            bounds.min_convolution_rank,
            bounds.max_convolution_rank,
        )
    })
}

/// Reads one convolution record. `check_rank` runs before the dimensions are read.
fn decode_record(
    reader: &mut StreamReader<'_>,
    check_rank: impl FnOnce(usize) -> Result<()>,
) -> Result<ConvolutionProperties> {
    let rank = reader.u32("rank")?;
    check_rank(rank)?;
    let dims_len = reader.u32("dimension count")?;
    if dims_len != rank {
        return Err(GenomeError::Format(format!(
            "convolution rank {} but {} dimensions",
            rank, dims_len
        )));
    }
    let dimensions = reader.u32_vec(dims_len, "dimensions")?;
    let input_range_begin = reader.u32("input range begin")?;
    let input_range_end = reader.u32("input range end")?;
    let space_len = reader.u32("input space rank")?;
    if space_len == 0 || space_len > MAX_INPUT_SPACE_RANK {
        return Err(GenomeError::Format(format!("invalid input space rank {}", space_len)));
    }
    let input_space_dimensions = reader.u32_vec(space_len, "input space dimensions")?;

    let props = ConvolutionProperties {
        rank,
        dimensions,
        input_range_begin,
        input_range_end,
        input_space_dimensions,
        num_layers: reader.u32("node layers")?,
        nodes_per_layer: reader.u32("nodes per layer")?,
        stepfactor: reader.f64("stepfactor")?,
        transfer_width: reader.f64("transfer width")?,
    };
    props
        .check_structure()
        .map_err(|e| GenomeError::Format(e.to_string()))?;
    Ok(props)
}
