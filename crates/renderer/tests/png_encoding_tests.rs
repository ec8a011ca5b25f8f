//! Tests for PNG encoding of rendered tiles.

use std::io::Read;

use renderer::png::encode_rgba;

fn chunk_types(png: &[u8]) -> Vec<String> {
    let mut types = Vec::new();
    let mut pos = 8;
    while pos + 8 <= png.len() {
        let len = u32::from_be_bytes(png[pos..pos + 4].try_into().unwrap()) as usize;
        types.push(String::from_utf8_lossy(&png[pos + 4..pos + 8]).to_string());
        pos += 12 + len;
    }
    types
}

#[test]
fn test_signature_and_chunk_order() {
    let png = encode_rgba(&[255, 0, 0, 255], 1, 1).unwrap();
    assert_eq!(&png[..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    assert_eq!(chunk_types(&png), vec!["IHDR", "IDAT", "IEND"]);
}

#[test]
fn test_ihdr_dimensions() {
    let png = encode_rgba(&vec![0u8; 3 * 2 * 4], 3, 2).unwrap();
    // 8 signature + 4 length + 4 type
    let ihdr = &png[16..29];
    assert_eq!(u32::from_be_bytes(ihdr[0..4].try_into().unwrap()), 3);
    assert_eq!(u32::from_be_bytes(ihdr[4..8].try_into().unwrap()), 2);
    assert_eq!(ihdr[8], 8);
    assert_eq!(ihdr[9], 6);
}

#[test]
fn test_idat_inflates_to_filtered_scanlines() {
    let pixels: Vec<u8> = (0..2 * 2 * 4).map(|i| i as u8).collect();
    let png = encode_rgba(&pixels, 2, 2).unwrap();

    let idat_start = 8 + 12 + 13;
    let len = u32::from_be_bytes(png[idat_start..idat_start + 4].try_into().unwrap()) as usize;
    let data = &png[idat_start + 8..idat_start + 8 + len];

    let mut raw = Vec::new();
    flate2::read::ZlibDecoder::new(data)
        .read_to_end(&mut raw)
        .unwrap();

    let mut expected = vec![0u8];
    expected.extend_from_slice(&pixels[..8]);
    expected.push(0);
    expected.extend_from_slice(&pixels[8..]);
    assert_eq!(raw, expected);
}
