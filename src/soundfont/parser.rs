//! The RIFF/SF2 binary parser: chunk walk, fixed-width record decoding, and
//! the zone-construction algorithm shared by presets and instruments.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::generator::{GeneratorId, GeneratorSet, Range, INSTRUMENT, KEY_RANGE, SAMPLE_ID, VEL_RANGE};
use super::modulator_params::{ModulatorParam, ModulatorParameterSet, Source, Transform};
use super::preset::{Instrument, Preset};
use super::riff::{list_form_and_chunks, walk_chunks};
use super::sample::Sample;
use super::zone::Zone;
use super::SoundFont;

fn u16_at(b: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([b[offset], b[offset + 1]])
}

fn i16_at(b: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([b[offset], b[offset + 1]])
}

fn u32_at(b: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([b[offset], b[offset + 1], b[offset + 2], b[offset + 3]])
}

fn fixed_name(b: &[u8]) -> String {
    let end = b.iter().position(|&c| c == 0).unwrap_or(b.len());
    String::from_utf8_lossy(&b[..end]).trim_end().to_string()
}

fn require_multiple(data: &[u8], record_size: usize, chunk_id: &str) -> Result<usize> {
    if data.len() % record_size != 0 {
        return Err(Error::MalformedChunk(format!(
            "'{chunk_id}' length {} is not a multiple of its {record_size}-byte record size",
            data.len()
        )));
    }
    Ok(data.len() / record_size)
}

struct RawHeader {
    name: String,
    preset: u16,
    bank: u16,
    bag_ndx: u16,
}

fn parse_preset_headers(data: &[u8]) -> Result<Vec<RawHeader>> {
    let count = require_multiple(data, 38, "phdr")?;
    Ok((0..count)
        .map(|i| {
            let b = &data[i * 38..(i + 1) * 38];
            RawHeader {
                name: fixed_name(&b[0..20]),
                preset: u16_at(b, 20),
                bank: u16_at(b, 22),
                bag_ndx: u16_at(b, 24),
            }
        })
        .collect())
}

fn parse_inst_headers(data: &[u8]) -> Result<Vec<RawHeader>> {
    let count = require_multiple(data, 22, "inst")?;
    Ok((0..count)
        .map(|i| {
            let b = &data[i * 22..(i + 1) * 22];
            RawHeader {
                name: fixed_name(&b[0..20]),
                preset: 0,
                bank: 0,
                bag_ndx: u16_at(b, 20),
            }
        })
        .collect())
}

struct RawBag {
    gen_ndx: u16,
    mod_ndx: u16,
}

fn parse_bags(data: &[u8], chunk_id: &str) -> Result<Vec<RawBag>> {
    let count = require_multiple(data, 4, chunk_id)?;
    Ok((0..count)
        .map(|i| {
            let b = &data[i * 4..(i + 1) * 4];
            RawBag {
                gen_ndx: u16_at(b, 0),
                mod_ndx: u16_at(b, 2),
            }
        })
        .collect())
}

struct RawGen {
    oper: u16,
    amount: i16,
}

fn parse_gens(data: &[u8], chunk_id: &str) -> Result<Vec<RawGen>> {
    let count = require_multiple(data, 4, chunk_id)?;
    Ok((0..count)
        .map(|i| {
            let b = &data[i * 4..(i + 1) * 4];
            RawGen {
                oper: u16_at(b, 0),
                amount: i16_at(b, 2),
            }
        })
        .collect())
}

struct RawMod {
    src: u16,
    dest: u16,
    amount: i16,
    amt_src: u16,
    trans: u16,
}

fn parse_mods(data: &[u8], chunk_id: &str) -> Result<Vec<RawMod>> {
    let count = require_multiple(data, 10, chunk_id)?;
    Ok((0..count)
        .map(|i| {
            let b = &data[i * 10..(i + 1) * 10];
            RawMod {
                src: u16_at(b, 0),
                dest: u16_at(b, 2),
                amount: i16_at(b, 4),
                amt_src: u16_at(b, 6),
                trans: u16_at(b, 8),
            }
        })
        .collect())
}

fn parse_samples(data: &[u8]) -> Result<Vec<Sample>> {
    let count = require_multiple(data, 46, "shdr")?;
    // Last entry is the "EOS" terminator and is skipped.
    let real_count = count.saturating_sub(1);
    Ok((0..real_count)
        .map(|i| {
            let b = &data[i * 46..(i + 1) * 46];
            Sample {
                name: fixed_name(&b[0..20]),
                start: u32_at(b, 20),
                end: u32_at(b, 24),
                start_loop: u32_at(b, 28),
                end_loop: u32_at(b, 32),
                sample_rate: u32_at(b, 36),
                original_key: b[40],
                pitch_correction: b[41] as i8,
            }
        })
        .collect())
}

/// Build the zone list for every parent (preset or instrument) described by
/// `headers`, given the flattened bag/generator/modulator arrays that follow
/// it in the same `pdta` chunk. `index_gen` distinguishes a local zone's
/// closing generator: `instrument` for preset zones, `sampleID` for
/// instrument zones.
fn build_zone_lists(
    headers: &[RawHeader],
    bags: &[RawBag],
    gens: &[RawGen],
    mods: &[RawMod],
    index_gen: GeneratorId,
) -> Result<Vec<Vec<Zone>>> {
    if headers.is_empty() {
        return Ok(Vec::new());
    }
    let mut result = Vec::with_capacity(headers.len() - 1);

    for parent in 0..headers.len() - 1 {
        let bag_start = headers[parent].bag_ndx as usize;
        let bag_end = headers[parent + 1].bag_ndx as usize;
        if bag_end > bags.len() || bag_start > bag_end {
            return Err(Error::MalformedChunk("bag index out of range".into()));
        }

        let mut locals = Vec::new();
        let mut global: Option<Zone> = None;

        for (offset, bag_idx) in (bag_start..bag_end).enumerate() {
            let gen_start = bags[bag_idx].gen_ndx as usize;
            let gen_end = bags
                .get(bag_idx + 1)
                .map(|b| b.gen_ndx as usize)
                .unwrap_or(gens.len());
            let mod_start = bags[bag_idx].mod_ndx as usize;
            let mod_end = bags
                .get(bag_idx + 1)
                .map(|b| b.mod_ndx as usize)
                .unwrap_or(mods.len());
            if gen_end > gens.len() || mod_end > mods.len() {
                return Err(Error::MalformedChunk("generator/modulator index out of range".into()));
            }

            let mut zone = Zone::default();
            let mut last_gen: Option<GeneratorId> = None;
            for g in &gens[gen_start..gen_end] {
                let id = g.oper as GeneratorId;
                if id >= super::generator::GEN_COUNT {
                    continue;
                }
                if id == KEY_RANGE {
                    zone.key_range = Range::from_raw(g.amount);
                } else if id == VEL_RANGE {
                    zone.vel_range = Range::from_raw(g.amount);
                } else {
                    zone.generators.set(id, g.amount);
                }
                last_gen = Some(id);
            }

            for m in &mods[mod_start..mod_end] {
                if (m.dest as usize) >= super::generator::GEN_COUNT {
                    continue;
                }
                zone.modulators.append(ModulatorParam {
                    src: Source::from_raw(m.src),
                    dest: m.dest as GeneratorId,
                    amount: m.amount,
                    amt_src: Source::from_raw(m.amt_src),
                    transform: Transform::from_raw(m.trans),
                });
            }

            let has_content = zone.generators.is_used(index_gen)
                || !zone.modulators.entries().is_empty()
                || last_gen.is_some();
            if last_gen == Some(index_gen) {
                locals.push(zone);
            } else if offset == 0 && has_content {
                global = Some(zone);
            }
        }

        if let Some(global_zone) = &global {
            for zone in &mut locals {
                zone.inherit_from_global(global_zone);
            }
        }

        result.push(locals);
    }

    Ok(result)
}

pub fn load(path: &Path) -> Result<SoundFont> {
    let bytes = std::fs::read(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_bytes(&bytes)
}

pub fn load_bytes(bytes: &[u8]) -> Result<SoundFont> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"sfbk" {
        return Err(Error::InvalidRiff("missing RIFF/sfbk header".into()));
    }

    let mut name = String::new();
    let mut pool: Vec<i16> = Vec::new();
    let mut phdr = Vec::new();
    let mut pbag = Vec::new();
    let mut pmod = Vec::new();
    let mut pgen = Vec::new();
    let mut inst = Vec::new();
    let mut ibag = Vec::new();
    let mut imod = Vec::new();
    let mut igen = Vec::new();
    let mut shdr = Vec::new();
    let mut seen_pdta = false;

    for chunk in walk_chunks(&bytes[12..])? {
        debug!(chunk = %String::from_utf8_lossy(&chunk.id), len = chunk.data.len(), "read chunk");
        if &chunk.id != b"LIST" {
            continue;
        }
        let (form, subs) = list_form_and_chunks(chunk.data)?;
        match &form {
            b"INFO" => {
                for sub in subs {
                    match &sub.id {
                        b"ifil" => {
                            if sub.data.len() < 4 {
                                return Err(Error::MalformedChunk("ifil too short".into()));
                            }
                            let major = u16_at(sub.data, 0);
                            let minor = u16_at(sub.data, 2);
                            if major > 2 || (major == 2 && minor > 4) {
                                return Err(Error::UnsupportedVersion { major, minor });
                            }
                            info!(major, minor, "soundfont version");
                        }
                        b"INAM" => name = fixed_name(sub.data),
                        _ => {}
                    }
                }
            }
            b"sdta" => {
                for sub in subs {
                    if &sub.id == b"smpl" {
                        pool = sub
                            .data
                            .chunks_exact(2)
                            .map(|c| i16::from_le_bytes([c[0], c[1]]))
                            .collect();
                    }
                }
            }
            b"pdta" => {
                seen_pdta = true;
                for sub in subs {
                    match &sub.id {
                        b"phdr" => phdr = parse_preset_headers(sub.data)?,
                        b"pbag" => pbag = parse_bags(sub.data, "pbag")?,
                        b"pmod" => pmod = parse_mods(sub.data, "pmod")?,
                        b"pgen" => pgen = parse_gens(sub.data, "pgen")?,
                        b"inst" => inst = parse_inst_headers(sub.data)?,
                        b"ibag" => ibag = parse_bags(sub.data, "ibag")?,
                        b"imod" => imod = parse_mods(sub.data, "imod")?,
                        b"igen" => igen = parse_gens(sub.data, "igen")?,
                        b"shdr" => shdr = parse_samples(sub.data)?,
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    if !seen_pdta || phdr.is_empty() || inst.is_empty() {
        return Err(Error::MalformedChunk("missing required pdta sub-chunks".into()));
    }
    if shdr.is_empty() {
        warn!("soundfont has no real samples (shdr contains only the EOS terminator)");
    }

    let inst_zones = build_zone_lists(&inst, &ibag, &igen, &imod, SAMPLE_ID)?;
    let instruments: Vec<Instrument> = inst
        .iter()
        .zip(inst_zones)
        .map(|(header, zones)| Instrument {
            name: header.name.clone(),
            zones,
        })
        .collect();

    let preset_zones = build_zone_lists(&phdr, &pbag, &pgen, &pmod, INSTRUMENT)?;
    let presets: Vec<Preset> = phdr
        .iter()
        .zip(preset_zones)
        .map(|(header, zones)| Preset {
            name: header.name.clone(),
            bank: header.bank,
            program: header.preset as u8,
            zones,
        })
        .collect();

    info!(
        presets = presets.len(),
        instruments = instruments.len(),
        samples = shdr.len(),
        "loaded soundfont"
    );

    Ok(SoundFont {
        name,
        pool: pool.into(),
        samples: shdr,
        instruments,
        presets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn le16(v: u16) -> [u8; 2] {
        v.to_le_bytes()
    }
    fn le32(v: u32) -> [u8; 4] {
        v.to_le_bytes()
    }

    fn chunk(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(id);
        out.extend_from_slice(&le32(body.len() as u32));
        out.extend_from_slice(body);
        if body.len() % 2 == 1 {
            out.push(0);
        }
        out
    }

    fn list(form: &[u8; 4], subs: &[Vec<u8>]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(form);
        for s in subs {
            body.extend_from_slice(s);
        }
        chunk(b"LIST", &body)
    }

    fn name20(s: &str) -> Vec<u8> {
        let mut buf = vec![0u8; 20];
        buf[..s.len()].copy_from_slice(s.as_bytes());
        buf
    }

    /// Build a minimal, valid SF2 file in memory: one preset, one
    /// instrument, one zone each, one sample, no modulators beyond defaults.
    fn synthetic_soundfont_bytes() -> Vec<u8> {
        // shdr: one real sample + EOS terminator.
        let mut shdr_body = Vec::new();
        let mut sample_rec = name20("tone");
        sample_rec.extend_from_slice(&le32(0)); // start
        sample_rec.extend_from_slice(&le32(1000)); // end
        sample_rec.extend_from_slice(&le32(0)); // start_loop
        sample_rec.extend_from_slice(&le32(1000)); // end_loop
        sample_rec.extend_from_slice(&le32(44100)); // sample_rate
        sample_rec.push(60); // original key
        sample_rec.push(0); // pitch correction
        sample_rec.extend_from_slice(&le16(0)); // sample link
        sample_rec.extend_from_slice(&le16(0)); // sample type
        shdr_body.extend_from_slice(&sample_rec);
        let mut eos = name20("EOS");
        eos.extend_from_slice(&[0u8; 26]);
        shdr_body.extend_from_slice(&eos);

        // igen: sampleID generator pointing at sample 0.
        let mut igen_body = Vec::new();
        igen_body.extend_from_slice(&le16(super::super::generator::SAMPLE_ID as u16));
        igen_body.extend_from_slice(&le16(0));

        // ibag: one bag at gen 0 / mod 0; terminator at gen 1 / mod 0.
        let mut ibag_body = Vec::new();
        ibag_body.extend_from_slice(&le16(0));
        ibag_body.extend_from_slice(&le16(0));
        ibag_body.extend_from_slice(&le16(1));
        ibag_body.extend_from_slice(&le16(0));

        // inst: one instrument + terminator.
        let mut inst_body = Vec::new();
        inst_body.extend_from_slice(&name20("Tone"));
        inst_body.extend_from_slice(&le16(0));
        inst_body.extend_from_slice(&name20("EOI"));
        inst_body.extend_from_slice(&le16(1));

        // pgen: instrument generator pointing at instrument 0.
        let mut pgen_body = Vec::new();
        pgen_body.extend_from_slice(&le16(super::super::generator::INSTRUMENT as u16));
        pgen_body.extend_from_slice(&le16(0));

        // pbag: one bag at gen 0 / mod 0; terminator at gen 1 / mod 0.
        let mut pbag_body = Vec::new();
        pbag_body.extend_from_slice(&le16(0));
        pbag_body.extend_from_slice(&le16(0));
        pbag_body.extend_from_slice(&le16(1));
        pbag_body.extend_from_slice(&le16(0));

        // phdr: one preset (bank 0, program 0) + terminator.
        let mut phdr_body = Vec::new();
        phdr_body.extend_from_slice(&name20("Tone"));
        phdr_body.extend_from_slice(&le16(0)); // preset
        phdr_body.extend_from_slice(&le16(0)); // bank
        phdr_body.extend_from_slice(&le16(0)); // bag_ndx
        phdr_body.extend_from_slice(&le32(0));
        phdr_body.extend_from_slice(&le32(0));
        phdr_body.extend_from_slice(&le32(0));
        phdr_body.extend_from_slice(&name20("EOP"));
        phdr_body.extend_from_slice(&le16(0));
        phdr_body.extend_from_slice(&le16(0));
        phdr_body.extend_from_slice(&le16(1));
        phdr_body.extend_from_slice(&le32(0));
        phdr_body.extend_from_slice(&le32(0));
        phdr_body.extend_from_slice(&le32(0));

        let mut ifil = Vec::new();
        ifil.extend_from_slice(&le16(2));
        ifil.extend_from_slice(&le16(1));

        let info = list(
            b"INFO",
            &[chunk(b"ifil", &ifil), chunk(b"INAM", b"synthetic")],
        );
        let sdta = list(b"sdta", &[chunk(b"smpl", &vec![0u8; 2000])]);
        let pdta = list(
            b"pdta",
            &[
                chunk(b"phdr", &phdr_body),
                chunk(b"pbag", &pbag_body),
                chunk(b"pmod", &[]),
                chunk(b"pgen", &pgen_body),
                chunk(b"inst", &inst_body),
                chunk(b"ibag", &ibag_body),
                chunk(b"imod", &[]),
                chunk(b"igen", &igen_body),
                chunk(b"shdr", &shdr_body),
            ],
        );

        let mut riff_body = Vec::new();
        riff_body.extend_from_slice(b"sfbk");
        riff_body.extend_from_slice(&info);
        riff_body.extend_from_slice(&sdta);
        riff_body.extend_from_slice(&pdta);

        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&le32(riff_body.len() as u32));
        out.extend_from_slice(&riff_body);
        out
    }

    #[test]
    fn loads_a_synthetic_single_preset_file() {
        let bytes = synthetic_soundfont_bytes();
        let sf = load_bytes(&bytes).expect("should parse");
        assert_eq!(sf.presets.len(), 1);
        assert_eq!(sf.instruments.len(), 1);
        assert_eq!(sf.samples.len(), 1);
        assert_eq!(sf.presets[0].bank, 0);
        assert_eq!(sf.presets[0].program, 0);
        assert_eq!(sf.presets[0].zones.len(), 1);
        assert_eq!(sf.instruments[0].zones.len(), 1);
    }

    #[test]
    fn rejects_bad_magic() {
        let err = load_bytes(b"not a soundfont at all").unwrap_err();
        assert!(matches!(err, Error::InvalidRiff(_)));
    }

    #[test]
    fn rejects_future_version() {
        let mut bytes = synthetic_soundfont_bytes();
        // Patch the ifil chunk's major version (located right after
        // "RIFF"+size+"sfbk"+"LIST"+size+"INFO"+"ifil"+size).
        let pos = bytes
            .windows(4)
            .position(|w| w == b"ifil")
            .expect("ifil present")
            + 4 // size field
            + 4; // chunk size bytes already skipped by position+4 above? recompute below
        let _ = pos;
        // Simpler: find "ifil" then skip the 4-byte declared size to reach the payload.
        let ifil_pos = bytes.windows(4).position(|w| w == b"ifil").unwrap();
        let major_pos = ifil_pos + 4 + 4;
        bytes[major_pos] = 99;
        let err = load_bytes(&bytes).unwrap_err();
        assert!(matches!(err, Error::UnsupportedVersion { .. }));
    }
}
