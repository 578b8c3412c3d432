#![allow(dead_code)]

use mp4_splice::{
    atom::{
        container_atom, ftyp::BRAND_ISOM, leaf_atom, AtomHeader, ChunkOffsetAtom, FileTypeAtom,
        FreeAtom, MovieHeaderAtom, RawData, TrackHeaderAtom, FREE, MDAT, MDIA, MINF, MOOV, STBL,
        TRAK,
    },
    Atom, AtomData,
};

/// MSB-first bit writer for synthetic NAL units.
#[derive(Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bits: u8,
}

impl BitWriter {
    pub fn bit(&mut self, bit: bool) -> &mut Self {
        if self.bits == 0 {
            self.bytes.push(0);
        }
        if bit {
            let last = self.bytes.len() - 1;
            self.bytes[last] |= 1 << (7 - self.bits);
        }
        self.bits = (self.bits + 1) % 8;
        self
    }

    pub fn bits(&mut self, value: u32, n: u8) -> &mut Self {
        for i in (0..n).rev() {
            self.bit((value >> i) & 1 == 1);
        }
        self
    }

    pub fn ue(&mut self, value: u32) -> &mut Self {
        let coded = u64::from(value) + 1;
        let len = 64 - coded.leading_zeros() as u8;
        self.bits(0, len - 1);
        for i in (0..len).rev() {
            self.bit((coded >> i) & 1 == 1);
        }
        self
    }

    pub fn finish(&mut self) -> Vec<u8> {
        self.bit(true);
        std::mem::take(&mut self.bytes)
    }
}

fn nal(header: u8, writer: &mut BitWriter) -> Vec<u8> {
    let mut nal = vec![header];
    nal.extend(writer.finish());
    nal
}

fn escape(nal: &[u8]) -> Vec<u8> {
    let mut escaped = Vec::with_capacity(nal.len());
    let mut zeros = 0;
    for &byte in nal {
        if zeros >= 2 && byte <= 3 {
            escaped.push(3);
            zeros = 0;
        }
        zeros = if byte == 0 { zeros + 1 } else { 0 };
        escaped.push(byte);
    }
    escaped
}

/// Baseline profile, POC type 0 with 4-bit lsb, 4-bit frame_num.
fn sps(width: u32, height: u32) -> Vec<u8> {
    let mut writer = BitWriter::default();
    writer
        .bits(66, 8)
        .bits(0xc0, 8)
        .bits(30, 8)
        .ue(0)
        .ue(0)
        .ue(0)
        .ue(0)
        .ue(1)
        .bit(false)
        .ue(width / 16 - 1)
        .ue(height / 16 - 1)
        .bit(true)
        .bit(true)
        .bit(false)
        .bit(false);
    nal(0x67, &mut writer)
}

fn pps() -> Vec<u8> {
    let mut writer = BitWriter::default();
    writer.ue(0).ue(0).bit(false).bit(false);
    nal(0x68, &mut writer)
}

fn slice(idr: bool, frame_num: u32, poc_lsb: u32, payload: &[u8]) -> Vec<u8> {
    let mut writer = BitWriter::default();
    writer
        .ue(0)
        .ue(if idr { 7 } else { 5 })
        .ue(0)
        .bits(frame_num, 4);
    if idr {
        writer.ue(0);
    }
    writer.bits(poc_lsb, 4);
    for byte in payload {
        writer.bits(u32::from(*byte), 8);
    }
    nal(if idr { 0x65 } else { 0x41 }, &mut writer)
}

/// H.264 Annex-B stream with one single-slice picture per `(idr, poc_lsb)`.
pub fn annex_b_stream(width: u32, height: u32, pictures: &[(bool, u32)]) -> Vec<u8> {
    let mut stream = Vec::new();
    let mut push = |nal: Vec<u8>| {
        stream.extend_from_slice(&[0, 0, 0, 1]);
        stream.extend(escape(&nal));
    };
    push(sps(width, height));
    push(pps());
    let mut frame_num = 0;
    for (i, (idr, poc_lsb)) in pictures.iter().enumerate() {
        if *idr {
            frame_num = 0;
        }
        push(vec![0x09, 0xf0]);
        push(slice(*idr, frame_num % 16, *poc_lsb, &[i as u8 + 1, 0, 0, 1]));
        frame_num += 1;
    }
    stream
}

pub const MEDIA_PAYLOAD: &[u8] = b"chunk payload";

pub fn track(track_id: u32, children: Vec<Atom>) -> Atom {
    let mut atoms = vec![leaf_atom(
        TrackHeaderAtom::builder()
            .track_id(track_id)
            .duration(1000)
            .build(),
    )];
    atoms.extend(children);
    container_atom(TRAK, atoms)
}

/// `ftyp`, `moov` with two tracks and `mdat`, where the first track's only chunk points at
/// [`MEDIA_PAYLOAD`] in `mdat`.
pub fn movie_file() -> Vec<u8> {
    let ftyp = leaf_atom(FileTypeAtom::builder().major_brand(BRAND_ISOM).build());
    let moov = |chunk_offset: u64| {
        container_atom(
            MOOV,
            vec![
                leaf_atom(
                    MovieHeaderAtom::builder()
                        .timescale(1000)
                        .duration(1000)
                        .next_track_id(3)
                        .build(),
                ),
                track(
                    1,
                    vec![container_atom(
                        MDIA,
                        vec![container_atom(
                            MINF,
                            vec![container_atom(
                                STBL,
                                vec![leaf_atom(
                                    ChunkOffsetAtom::builder()
                                        .chunk_offsets([chunk_offset])
                                        .build(),
                                )],
                            )],
                        )],
                    )],
                ),
                track(2, Vec::new()),
            ],
        )
    };
    let chunk_offset = ftyp.encoded_size() + moov(0).encoded_size() + 8;
    let mdat = Atom::builder()
        .header(AtomHeader::new(MDAT))
        .data(AtomData::RawData(RawData(MEDIA_PAYLOAD.to_vec())))
        .build();

    let mut file = Vec::new();
    for atom in [ftyp, moov(chunk_offset), mdat] {
        file.extend(atom.into_bytes());
    }
    file
}

/// A track atom padded with `padding` bytes of `free`, as stored in a standalone file.
pub fn track_file(track_id: u32, padding: usize) -> Vec<u8> {
    track(track_id, vec![leaf_atom(FreeAtom::new(FREE, padding))]).into_bytes()
}
