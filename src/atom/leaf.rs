/*!
 * Atoms without children.
 */

pub mod ctts;
pub mod dref;
pub mod free;
pub mod ftyp;
pub mod hdlr;
pub mod mdat;
pub mod mdhd;
pub mod mvhd;
pub mod smhd;
pub mod stco_co64;
pub mod stsc;
pub mod stsd;
pub mod stss;
pub mod stsz;
pub mod stts;
pub mod tkhd;
pub mod vmhd;

pub use self::{
    ctts::{CompositionOffsetAtom, CTTS},
    dref::{DataReferenceAtom, DREF},
    free::{FreeAtom, FREE, SKIP},
    ftyp::{FileTypeAtom, FTYP},
    hdlr::{HandlerReferenceAtom, HandlerType, HDLR},
    mdat::{MediaDataAtom, MDAT},
    mdhd::{LanguageCode, MediaHeaderAtom, MDHD},
    mvhd::{MovieHeaderAtom, MVHD},
    smhd::{SoundMediaHeaderAtom, SMHD},
    stco_co64::{ChunkOffsetAtom, CO64, STCO},
    stsc::{SampleToChunkAtom, STSC},
    stsd::{SampleDescriptionTableAtom, SampleEntry, STSD},
    stss::{SyncSampleAtom, STSS},
    stsz::{SampleSizeAtom, STSZ},
    stts::{TimeToSampleAtom, STTS},
    tkhd::{TrackHeaderAtom, TKHD},
    vmhd::{VideoMediaHeaderAtom, VMHD},
};
