use tiff_meta::{
    exif::{DirectoryType, Endianness, Exif, FieldType, typed::decode},
    write::{OutputField, OutputSet},
};
use tiff_meta_types::exif::tags::GpsTag;

fn logger() {
    _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::max())
        .format_file(true)
        .format_line_number(true)
        .try_init();
}

fn parse(blob: &[u8]) -> Exif {
    Exif::new(&mut &blob[..]).unwrap()
}

/// Small byte values, so floats never come out as `NaN`.
fn raw_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 7) as u8).collect()
}

#[test]
fn every_type_and_count_survives_a_rewrite() {
    logger();

    const COUNTS: [u32; 5] = [0, 1, 2, 51, 52];

    for endianness in [Endianness::Little, Endianness::Big] {
        let mut set = OutputSet::new(endianness);
        let root = set.get_or_create_directory(DirectoryType::Root);

        // private tags, so no table gets a say in the type
        let mut expected = Vec::new();
        for (t, ty) in FieldType::ALL.into_iter().enumerate() {
            for (c, count) in COUNTS.into_iter().enumerate() {
                let tag = 0xC000 + (t * COUNTS.len() + c) as u16;
                let raw = raw_bytes(count as usize * ty.size_bytes() as usize);
                let value = decode(ty, &raw, endianness, count).unwrap();

                root.add_field(OutputField::new(
                    tag,
                    DirectoryType::Root,
                    ty,
                    count,
                    raw,
                    endianness,
                ))
                .unwrap();
                expected.push((tag, ty, count, value));
            }
        }

        let exif = parse(&set.serialize().unwrap());
        for (tag, ty, count, value) in expected {
            let field = exif
                .find_field(DirectoryType::Root, tag)
                .unwrap_or_else(|| panic!("tag `{tag:#x}` ({ty:?} x {count}) went missing"));

            assert_eq!(field.field_type(), ty);
            assert_eq!(field.count(), count);
            assert_eq!(field.value(), Ok(value), "{ty:?} x {count}");
        }
    }
}

#[test]
fn long_lists_are_described_with_a_marker() {
    logger();

    let mut set = OutputSet::new(Endianness::Little);
    let root = set.get_or_create_directory(DirectoryType::Root);
    for count in [50_u32, 51, 52] {
        let raw = (0..count as u16).flat_map(u16::to_le_bytes).collect();
        root.add_field(OutputField::new(
            0xD000 + count as u16,
            DirectoryType::Root,
            FieldType::Short,
            count,
            raw,
            Endianness::Little,
        ))
        .unwrap();
    }

    let exif = parse(&set.serialize().unwrap());
    let describe = |count: u16| {
        exif.find_field(DirectoryType::Root, 0xD000 + count)
            .unwrap()
            .describe_value()
    };

    assert!(describe(50).ends_with("48, 49"));
    assert!(describe(51).ends_with("49, 50"));
    assert!(!describe(51).contains("..."));
    assert!(describe(52).ends_with("50... (52)"));
}

#[test]
fn gps_needs_all_four_fields() {
    logger();

    let mut full = OutputSet::new(Endianness::Big);
    full.set_gps_coordinates(-74.0, 40.7167).unwrap();

    let exif = parse(&full.serialize().unwrap());
    let gps = exif.gps_info().unwrap().unwrap();
    assert_eq!(gps.longitude_ref(), "W");
    assert_eq!(gps.longitude_as_degrees_east(), -74.0);
    assert!((gps.latitude_as_degrees_north() - 40.7167).abs() < 1e-6);

    for missing in [
        GpsTag::GPSLatitudeRef,
        GpsTag::GPSLatitude,
        GpsTag::GPSLongitudeRef,
        GpsTag::GPSLongitude,
    ] {
        let mut set = full.clone();
        set.directory_mut(DirectoryType::Gps)
            .unwrap()
            .remove_field(missing.tag_id())
            .unwrap();

        let exif = parse(&set.serialize().unwrap());
        assert!(
            exif.gps_info().unwrap().is_none(),
            "GPS shouldn't be read without `{missing:?}`"
        );
    }

    // no GPS directory at all
    let exif = parse(&OutputSet::new(Endianness::Little).serialize().unwrap());
    assert!(exif.gps_info().unwrap().is_none());
}
