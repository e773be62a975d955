//! The AmdSL signed-image header.
//!
//! Word 0 of the image carries the length of the signed region in its upper
//! 16 bits. The header starts right after that region, on a 16-byte
//! boundary, and this module fills in four of its words.

use std::fmt;

use crate::error::FormatError;
use crate::image::{Image, WORD};

///////////////////////////////////////////////////////////////////////////
// Layout.

/// "$AS1", stored little-endian.
pub const HEADER_VERSION: u32 = 0x3153_4124;

// Byte offsets from the start of the header.
pub const HEADER_VERSION_OFFSET: usize = 0x10;
pub const SIZE_FW_SIGNED_OFFSET: usize = 0x14;
pub const SECURITY_PATCH_LEVEL_OFFSET: usize = 0x4C;
pub const IMAGE_VERSION_OFFSET: usize = 0x60;

/// Every shipped AmdSL binary is exactly this long.
pub const EXPECTED_IMAGE_SIZE: usize = 64 * 1024;

pub const SIGNED_LEN_ALIGN: u32 = 16;

const SIGNED_LEN_SHIFT: u32 = 16;
const SIGNED_LEN_MAX: u32 = 0xFFFF;

///////////////////////////////////////////////////////////////////////////
// Word 0.

/// Which low bits of word 0 survive when the signed length is realigned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Word0Mask {
    /// Keep only bits 0..8. Matches the images produced by the historical
    /// header tool, which drops bits 8..16.
    #[default]
    Compatible,
    /// Keep all of bits 0..16.
    PreserveLow16,
}

impl Word0Mask {
    pub fn bits(self) -> u32 {
        match self {
            Word0Mask::Compatible => 0xFF,
            Word0Mask::PreserveLow16 => 0xFFFF,
        }
    }
}

/// Rounds a signed length up to the next multiple of 16.
pub fn align_signed_len(raw: u32) -> u32 {
    match raw % SIGNED_LEN_ALIGN {
        0 => raw,
        rem => raw + (SIGNED_LEN_ALIGN - rem),
    }
}

///////////////////////////////////////////////////////////////////////////
// Patching.

/// The image is not the nominal 64 KiB. Patching still goes ahead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SizeWarning {
    pub actual: usize,
}

impl fmt::Display for SizeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AmdSL binary size is {} bytes, not 64K ({})",
            self.actual, EXPECTED_IMAGE_SIZE
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PatchReport {
    /// Signed length as found in word 0.
    pub raw_signed_len: u32,
    /// Signed length after alignment; also the byte offset of the header.
    pub signed_len: u32,
    /// Whether word 0 had to be rewritten.
    pub realigned: bool,
    pub size_warning: Option<SizeWarning>,
}

/// Aligns the signed length in word 0 and writes the header fields.
///
/// All indices are validated before the first write, so on error the image
/// is exactly as it was.
pub fn patch(
    image: &mut Image,
    version: u32,
    spl: u32,
    mask: Word0Mask,
) -> Result<PatchReport, FormatError> {
    let word0 = image.word(0)?;
    let raw_signed_len = word0 >> SIGNED_LEN_SHIFT;
    let signed_len = align_signed_len(raw_signed_len);
    let realigned = signed_len != raw_signed_len;

    let word0 = if realigned {
        if signed_len > SIGNED_LEN_MAX {
            return Err(FormatError::SignedLenOverflow { aligned: signed_len });
        }
        log::debug!(
            "realigning signed length {:#x} -> {:#x}",
            raw_signed_len,
            signed_len
        );
        (word0 & mask.bits()) | (signed_len << SIGNED_LEN_SHIFT)
    } else {
        word0
    };

    let size_warning = if image.byte_len() != EXPECTED_IMAGE_SIZE {
        let warning = SizeWarning { actual: image.byte_len() };
        log::warn!("{}", warning);
        Some(warning)
    } else {
        None
    };

    let base = signed_len as usize / WORD;
    let fields = [
        (HEADER_VERSION_OFFSET, HEADER_VERSION),
        (SIZE_FW_SIGNED_OFFSET, signed_len),
        (IMAGE_VERSION_OFFSET, version),
        (SECURITY_PATCH_LEVEL_OFFSET, spl),
    ];

    for (offset, _) in fields {
        image.check_word(base + offset / WORD)?;
    }

    image.set_word(0, word0)?;
    for (offset, value) in fields {
        image.set_word(base + offset / WORD, value)?;
    }

    Ok(PatchReport {
        raw_signed_len,
        signed_len,
        realigned,
        size_warning,
    })
}

///////////////////////////////////////////////////////////////////////////
// Read-back.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeaderFields {
    /// Signed length stored in word 0, aligned the same way `patch` aligns it.
    pub signed_len: u32,
    pub header_version: u32,
    pub size_fw_signed: u32,
    pub security_patch_level: u32,
    pub image_version: u32,
}

pub fn read_fields(image: &Image) -> Result<HeaderFields, FormatError> {
    let signed_len = align_signed_len(image.word(0)? >> SIGNED_LEN_SHIFT);
    let base = signed_len as usize / WORD;
    let field = |offset: usize| image.word(base + offset / WORD);

    Ok(HeaderFields {
        signed_len,
        header_version: field(HEADER_VERSION_OFFSET)?,
        size_fw_signed: field(SIZE_FW_SIGNED_OFFSET)?,
        security_patch_level: field(SECURITY_PATCH_LEVEL_OFFSET)?,
        image_version: field(IMAGE_VERSION_OFFSET)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Image filled with a recognisable pattern and the given word 0.
    fn image_with(len: usize, word0: u32) -> Image {
        let mut bytes: Vec<u8> = (0..len).map(|i| (i as u8) ^ 0x5A).collect();
        bytes[..4].copy_from_slice(&word0.to_le_bytes());
        Image::from_bytes(bytes).unwrap()
    }

    fn header_byte_ranges(signed_len: usize) -> Vec<std::ops::Range<usize>> {
        [
            HEADER_VERSION_OFFSET,
            SIZE_FW_SIGNED_OFFSET,
            SECURITY_PATCH_LEVEL_OFFSET,
            IMAGE_VERSION_OFFSET,
        ]
        .iter()
        .map(|off| signed_len + off..signed_len + off + WORD)
        .collect()
    }

    #[test]
    fn alignment_rounds_up_to_sixteen() {
        assert_eq!(align_signed_len(0), 0);
        assert_eq!(align_signed_len(0x1230), 0x1230);
        assert_eq!(align_signed_len(0x1231), 0x1240);
        assert_eq!(align_signed_len(0x1235), 0x1240);
        assert_eq!(align_signed_len(0x123F), 0x1240);
        for raw in 0..=0xFFFFu32 {
            let aligned = align_signed_len(raw);
            assert_eq!(aligned % SIGNED_LEN_ALIGN, 0);
            if raw % SIGNED_LEN_ALIGN == 0 {
                assert_eq!(aligned, raw);
            } else {
                assert!(aligned > raw && aligned < raw + SIGNED_LEN_ALIGN);
            }
        }
    }

    #[test]
    fn patches_aligned_image() {
        let mut image = image_with(EXPECTED_IMAGE_SIZE, 0x1230_00AB);
        let original = image.clone();

        let report = patch(&mut image, 0x0A0B_0C0D, 0x0000_0001, Word0Mask::Compatible).unwrap();
        assert_eq!(
            report,
            PatchReport {
                raw_signed_len: 0x1230,
                signed_len: 0x1230,
                realigned: false,
                size_warning: None,
            }
        );

        let base = 0x48C;
        assert_eq!(image.word(base + 0x10 / 4), Ok(0x3153_4124));
        assert_eq!(image.word(base + 0x14 / 4), Ok(0x0000_1230));
        assert_eq!(image.word(base + 0x4C / 4), Ok(0x0000_0001));
        assert_eq!(image.word(base + 0x60 / 4), Ok(0x0A0B_0C0D));
        assert_eq!(image.word(0), Ok(0x1230_00AB));

        let header = header_byte_ranges(0x1230);
        for (i, (a, b)) in original.as_bytes().iter().zip(image.as_bytes()).enumerate() {
            if !header.iter().any(|r| r.contains(&i)) {
                assert_eq!(a, b, "byte {:#x} changed", i);
            }
        }
    }

    #[test]
    fn realigns_and_clears_second_byte() {
        let mut image = image_with(EXPECTED_IMAGE_SIZE, 0x1235_BEEF);
        let report = patch(&mut image, 1, 2, Word0Mask::Compatible).unwrap();

        assert!(report.realigned);
        assert_eq!(report.signed_len, 0x1240);
        assert_eq!(image.word(0), Ok(0x1240_00EF));
        assert_eq!(image.word(0x1240 / 4 + 0x14 / 4), Ok(0x1240));
    }

    #[test]
    fn realigns_and_keeps_low_half_when_asked() {
        let mut image = image_with(EXPECTED_IMAGE_SIZE, 0x1235_BEEF);
        patch(&mut image, 1, 2, Word0Mask::PreserveLow16).unwrap();
        assert_eq!(image.word(0), Ok(0x1240_BEEF));
    }

    #[test]
    fn patching_twice_changes_nothing() {
        let mut image = image_with(EXPECTED_IMAGE_SIZE, 0x2001_1234);
        patch(&mut image, 0x42, 0x7, Word0Mask::Compatible).unwrap();
        let once = image.clone();

        let report = patch(&mut image, 0x42, 0x7, Word0Mask::Compatible).unwrap();
        assert!(!report.realigned);
        assert_eq!(image, once);
    }

    #[test]
    fn short_image_warns_but_patches() {
        let mut image = image_with(32 * 1024, 0x1230_0000);
        let report = patch(&mut image, 3, 4, Word0Mask::Compatible).unwrap();

        assert_eq!(report.size_warning, Some(SizeWarning { actual: 32 * 1024 }));
        assert_eq!(
            read_fields(&image),
            Ok(HeaderFields {
                signed_len: 0x1230,
                header_version: HEADER_VERSION,
                size_fw_signed: 0x1230,
                security_patch_level: 4,
                image_version: 3,
            })
        );
    }

    #[test]
    fn header_must_fit_in_image() {
        // Last patched word sits at 0x100 + 0x60, so 0x164 bytes is the minimum.
        let mut image = image_with(0x164, 0x0100_0000);
        assert!(patch(&mut image, 1, 1, Word0Mask::Compatible).is_ok());

        let mut image = image_with(0x160, 0x00F1_0033);
        let original = image.clone();
        assert_eq!(
            patch(&mut image, 1, 1, Word0Mask::Compatible),
            Err(FormatError::OutOfBounds { offset: 0x160, len: 0x160 })
        );
        assert_eq!(image, original);
    }

    #[test]
    fn signed_len_past_sixteen_bits_is_rejected() {
        let mut image = image_with(EXPECTED_IMAGE_SIZE, 0xFFF1_0000);
        let original = image.clone();
        assert_eq!(
            patch(&mut image, 1, 1, Word0Mask::Compatible),
            Err(FormatError::SignedLenOverflow { aligned: 0x1_0000 })
        );
        assert_eq!(image, original);
    }

    #[test]
    fn magic_spells_as1() {
        assert_eq!(&HEADER_VERSION.to_le_bytes(), b"$AS1");
    }
}
