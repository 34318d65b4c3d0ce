//! Integration coverage for the encrypter's error taxonomy (spec.md §7) and
//! the offset/ECD fidelity invariants (spec.md §8, properties 4 and 5).

use s_zip::{EncryptingWriter, Signature};
use std::io::Write;

fn lfh(name: &str, content: &[u8], flags: u16, crc: u32) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&Signature::LocalFileHeader.bytes());
    out.extend_from_slice(&20u16.to_le_bytes());
    out.extend_from_slice(&flags.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&crc.to_le_bytes());
    out.extend_from_slice(&(content.len() as u32).to_le_bytes());
    out.extend_from_slice(&(content.len() as u32).to_le_bytes());
    out.extend_from_slice(&(name.len() as u16).to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(content);
    out
}

fn cfh(name: &str, content: &[u8], flags: u16, crc: u32, local_offset: u32) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&Signature::CentralFileHeader.bytes());
    out.extend_from_slice(&20u16.to_le_bytes());
    out.extend_from_slice(&20u16.to_le_bytes());
    out.extend_from_slice(&flags.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&crc.to_le_bytes());
    out.extend_from_slice(&(content.len() as u32).to_le_bytes());
    out.extend_from_slice(&(content.len() as u32).to_le_bytes());
    out.extend_from_slice(&(name.len() as u16).to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&local_offset.to_le_bytes());
    out.extend_from_slice(name.as_bytes());
    out
}

fn ecd(entry_count: u16, cd_size: u32, cd_offset: u32) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&Signature::EndOfCentralDirectory.bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&entry_count.to_le_bytes());
    out.extend_from_slice(&entry_count.to_le_bytes());
    out.extend_from_slice(&cd_size.to_le_bytes());
    out.extend_from_slice(&cd_offset.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out
}

#[test]
fn already_encrypted_input_is_rejected_before_payload() {
    // Scenario S4: bit 0 already set on the input LFH.
    let archive = lfh("a.txt", b"x", 0x0001, 0xDEAD_BEEF);

    let mut writer = EncryptingWriter::new(Vec::new(), b"pw");
    let err = writer.write_all(&archive).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    assert!(err.to_string().contains("already marked as encrypted"));
}

#[test]
fn strong_encryption_flag_on_input_is_rejected() {
    let archive = lfh("a.txt", b"x", 0x0040, 0xDEAD_BEEF);

    let mut writer = EncryptingWriter::new(Vec::new(), b"pw");
    let err = writer.write_all(&archive).unwrap_err();
    assert!(err.to_string().contains("strong encryption"));
}

#[test]
fn zero_length_file_name_is_malformed() {
    let archive = lfh("", b"x", 0, 0xDEAD_BEEF);

    let mut writer = EncryptingWriter::new(Vec::new(), b"pw");
    let err = writer.write_all(&archive).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    assert!(err.to_string().contains("zero-length file name"));
}

#[test]
fn unrecognized_signature_at_boundary_is_malformed() {
    let mut archive = lfh("a.txt", b"x", 0, 0xDEAD_BEEF);
    archive.extend_from_slice(&[0x50, 0x4B, 0x99, 0x99]); // not a recognized signature

    let mut writer = EncryptingWriter::new(Vec::new(), b"pw");
    let err = writer.write_all(&archive).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    assert!(err.to_string().contains("unrecognized record signature"));
}

#[test]
fn finish_before_end_of_central_directory_fails() {
    let archive = lfh("a.txt", b"hello", 0, 0xDEAD_BEEF);

    let mut writer = EncryptingWriter::new(Vec::new(), b"pw");
    writer.write_all(&archive).unwrap();
    let err = writer.finish().unwrap_err();
    assert!(err.to_string().contains("end-of-central-directory"));
}

#[test]
fn local_header_offsets_and_central_directory_offset_are_fixed_up() {
    // Properties 4 and 5: for each file, CFH-offset-42's local-header offset
    // must equal the real byte position of that file's LFH in the *output*,
    // and the ECD's CD-offset field must equal the output position of the
    // first CFH — both shifted by the 12-byte-per-file growth the injected
    // encryption headers cause.
    let files = [("a.txt", &b"first"[..]), ("b.txt", &b"second file"[..]), ("c.txt", &b""[..])];

    let mut plain = Vec::new();
    let mut plain_local_offsets = Vec::new();
    for (name, content) in files.iter().copied() {
        plain_local_offsets.push(plain.len() as u32);
        plain.extend_from_slice(&lfh(name, content, 0, 0xDEAD_BEEF));
    }
    let cfh_start = plain.len() as u32;
    for (i, (name, content)) in files.iter().copied().enumerate() {
        plain.extend_from_slice(&cfh(name, content, 0, 0xDEAD_BEEF, plain_local_offsets[i]));
    }
    let cd_size = plain.len() as u32 - cfh_start;
    plain.extend_from_slice(&ecd(files.len() as u16, cd_size, cfh_start));

    let mut writer = EncryptingWriter::new(Vec::new(), b"pw");
    writer.write_all(&plain).unwrap();
    let encrypted = writer.finish().unwrap();

    // Recompute where each LFH actually landed in the output: every prior
    // file added exactly 12 bytes (one encryption header) to the offset.
    let mut expected_local_offsets = Vec::new();
    let mut running_growth = 0u32;
    for &orig_offset in &plain_local_offsets {
        expected_local_offsets.push(orig_offset + running_growth);
        running_growth += 12;
    }
    let expected_cfh_start = cfh_start + running_growth;

    // Find each LFH signature in the output and confirm it's where expected.
    for (i, expected) in expected_local_offsets.iter().enumerate() {
        let pos = *expected as usize;
        assert_eq!(
            &encrypted[pos..pos + 4],
            &Signature::LocalFileHeader.bytes(),
            "file {i} LFH not at expected offset"
        );
    }

    // Find the first CFH and confirm its declared local-header-offset field
    // (at CFH offset 42) matches the corresponding LFH's real position.
    let first_cfh_pos = expected_cfh_start as usize;
    assert_eq!(
        &encrypted[first_cfh_pos..first_cfh_pos + 4],
        &Signature::CentralFileHeader.bytes()
    );
    for i in 0..files.len() {
        // Each CFH record is fixed-width here (no extra/comment fields) plus
        // its own file name, so advance by a per-record stride.
        let record_start = first_cfh_pos + (0..i).map(|j| 46 + files[j].0.len()).sum::<usize>();
        let offset_field_start = record_start + 42;
        let declared = u32::from_le_bytes([
            encrypted[offset_field_start],
            encrypted[offset_field_start + 1],
            encrypted[offset_field_start + 2],
            encrypted[offset_field_start + 3],
        ]);
        assert_eq!(declared, expected_local_offsets[i], "file {i} offset field mismatch");
    }

    // ECD's CD-offset field (offset 16 within the ECD record) equals the
    // first CFH's real position.
    let ecd_pos = encrypted.len() - 22; // no comment in this fixture
    assert_eq!(&encrypted[ecd_pos..ecd_pos + 4], &Signature::EndOfCentralDirectory.bytes());
    let ecd_cd_offset = u32::from_le_bytes([
        encrypted[ecd_pos + 16],
        encrypted[ecd_pos + 17],
        encrypted[ecd_pos + 18],
        encrypted[ecd_pos + 19],
    ]);
    assert_eq!(ecd_cd_offset, expected_cfh_start);
}

#[test]
fn every_lfh_and_cfh_size_grows_by_twelve_bytes() {
    let plain_content = b"some payload bytes of a known length";
    let mut plain = lfh("a.txt", plain_content, 0, 0xDEAD_BEEF);
    let cfh_start = plain.len() as u32;
    plain.extend_from_slice(&cfh("a.txt", plain_content, 0, 0xDEAD_BEEF, 0));
    let cd_size = plain.len() as u32 - cfh_start;
    plain.extend_from_slice(&ecd(1, cd_size, cfh_start));

    let mut writer = EncryptingWriter::new(Vec::new(), b"pw");
    writer.write_all(&plain).unwrap();
    let encrypted = writer.finish().unwrap();

    let lfh_csize = u32::from_le_bytes([encrypted[18], encrypted[19], encrypted[20], encrypted[21]]);
    assert_eq!(lfh_csize, plain_content.len() as u32 + 12);

    // LFH flags: bit0 set, bit3 clear.
    let lfh_flags = u16::from_le_bytes([encrypted[6], encrypted[7]]);
    assert_eq!(lfh_flags & 0x0001, 0x0001);
    assert_eq!(lfh_flags & 0x0008, 0);
}
