//! Cross-container nesting, summary-data staging, splice equivalence, and
//! decode tolerance on truncated or partially understood input.

use omm_codec::container::{
    Array, ArrayEntry, ContainerType, ElementEntry, ElementList, FieldEntry, FieldList,
    FieldLoad, FilterEntry, FilterEntryAction, FilterList, Map, MapEntry, MapEntryAction,
    OpaqueData, Series, SeriesEntry, Vector, VectorEntry, VectorEntryAction,
};
use omm_codec::{
    CodecError, DataDictionary, DataType, DecodeIterator, Decoded, EncodeIterator,
    PrimitiveValue,
};

fn order_book_level(enc: &mut EncodeIterator<'_>, price: u64, size: u64) {
    FieldList::new().encode_init(enc).unwrap();
    FieldEntry::new(22)
        .encode(enc, &PrimitiveValue::UInt(price))
        .unwrap();
    FieldEntry::new(30)
        .encode(enc, &PrimitiveValue::UInt(size))
        .unwrap();
    FieldList::encode_complete(enc, true).unwrap();
}

#[test]
fn map_with_staged_summary_matches_pre_encoded_splice() {
    // Summary encoded standalone.
    let mut summary_buf = [0u8; 64];
    let mut enc = EncodeIterator::new(&mut summary_buf).unwrap();
    order_book_level(&mut enc, 0, 0);
    let summary_bytes = enc.encoded().to_vec();

    fn encode_entries(enc: &mut EncodeIterator<'_>) {
        let mut payload_buf = [0u8; 64];
        let mut inner = EncodeIterator::new(&mut payload_buf).unwrap();
        order_book_level(&mut inner, 10050, 300);
        let payload = inner.encoded().to_vec();
        let mut entry = MapEntry::new(MapEntryAction::Add);
        entry.data = &payload;
        entry
            .encode(enc, &PrimitiveValue::AsciiString(b"bid:1"))
            .unwrap();
        MapEntry::new(MapEntryAction::Delete)
            .encode(enc, &PrimitiveValue::AsciiString(b"bid:9"))
            .unwrap();
    }

    // Spliced summary.
    let mut map = Map::new(DataType::AsciiString, ContainerType::FieldList);
    map.summary = OpaqueData::PreEncoded(&summary_bytes);
    map.total_count_hint = Some(2);
    let mut buf_a = [0u8; 256];
    let mut enc = EncodeIterator::new(&mut buf_a).unwrap();
    map.encode_init(&mut enc).unwrap();
    encode_entries(&mut enc);
    Map::encode_complete(&mut enc, true).unwrap();
    let spliced = enc.encoded().to_vec();

    // Staged summary.
    let mut map = Map::new(DataType::AsciiString, ContainerType::FieldList);
    map.summary = OpaqueData::Pending;
    map.total_count_hint = Some(2);
    let mut buf_b = [0u8; 256];
    let mut enc = EncodeIterator::new(&mut buf_b).unwrap();
    map.encode_init(&mut enc).unwrap();
    order_book_level(&mut enc, 0, 0);
    map.encode_summary_complete(&mut enc, true).unwrap();
    encode_entries(&mut enc);
    Map::encode_complete(&mut enc, true).unwrap();
    let staged = enc.encoded().to_vec();

    assert_eq!(staged, spliced);

    // Walk it back out.
    let mut dec = DecodeIterator::new(&staged).unwrap();
    let decoded_map = Map::decode(&mut dec).unwrap();
    assert_eq!(decoded_map.key_type, DataType::AsciiString);
    assert_eq!(decoded_map.summary_bytes(), Some(summary_bytes.as_slice()));
    assert_eq!(decoded_map.total_count_hint, Some(2));

    let first = MapEntry::decode(&mut dec, &decoded_map).unwrap().unwrap();
    assert_eq!(first.action, MapEntryAction::Add);
    assert_eq!(
        first.key_value(decoded_map.key_type).unwrap(),
        Decoded::Value(PrimitiveValue::AsciiString(b"bid:1"))
    );
    // Nested payload decodes in place; the rest of it can be abandoned
    // without losing the parent's position.
    FieldList::decode(&mut dec).unwrap();
    assert!(FieldEntry::decode(&mut dec).unwrap().is_some());
    dec.finish_entries();

    let second = MapEntry::decode(&mut dec, &decoded_map).unwrap().unwrap();
    assert_eq!(second.action, MapEntryAction::Delete);
    assert_eq!(second.load(&decoded_map), (ContainerType::NoData, &[][..]));
    assert!(MapEntry::decode(&mut dec, &decoded_map).unwrap().is_none());
}

#[test]
fn abandoned_summary_clears_its_flag() {
    let mut element_buf = [0u8; 64];
    let mut enc = EncodeIterator::new(&mut element_buf).unwrap();
    ElementList::new().encode_init(&mut enc).unwrap();
    ElementEntry::new(b"Currency")
        .encode(&mut enc, &PrimitiveValue::AsciiString(b"USD"))
        .unwrap();
    ElementList::encode_complete(&mut enc, true).unwrap();
    let element_bytes = enc.encoded().to_vec();

    let mut map = Map::new(DataType::UInt, ContainerType::ElementList);
    map.summary = OpaqueData::Pending;
    let mut buf = [0u8; 128];
    let mut enc = EncodeIterator::new(&mut buf).unwrap();
    map.encode_init(&mut enc).unwrap();
    order_book_level(&mut enc, 1, 1);
    // Summary abandoned: its bytes are erased and the flag bit cleared.
    map.encode_summary_complete(&mut enc, false).unwrap();
    let mut entry = MapEntry::new(MapEntryAction::Add);
    entry.data = &element_bytes;
    entry.encode(&mut enc, &PrimitiveValue::UInt(1)).unwrap();
    Map::encode_complete(&mut enc, true).unwrap();
    let encoded = enc.encoded().to_vec();

    let mut dec = DecodeIterator::new(&encoded).unwrap();
    let decoded_map = Map::decode(&mut dec).unwrap();
    assert_eq!(decoded_map.summary, OpaqueData::None);
    let decoded_entry = MapEntry::decode(&mut dec, &decoded_map).unwrap().unwrap();
    assert_eq!(decoded_entry.load(&decoded_map).0, ContainerType::ElementList);
    ElementList::decode(&mut dec).unwrap();
    let element = ElementEntry::decode(&mut dec).unwrap().unwrap();
    assert_eq!(
        element.value().unwrap(),
        Decoded::Value(PrimitiveValue::AsciiString(b"USD"))
    );
    assert!(ElementEntry::decode(&mut dec).unwrap().is_none());
    assert!(MapEntry::decode(&mut dec, &decoded_map).unwrap().is_none());
}

#[test]
fn vector_actions_roundtrip() {
    let mut level_buf = [0u8; 64];
    let mut enc = EncodeIterator::new(&mut level_buf).unwrap();
    order_book_level(&mut enc, 10, 20);
    let level = enc.encoded().to_vec();

    let mut vector = Vector::new(ContainerType::FieldList);
    vector.supports_sorting = true;
    vector.total_count_hint = Some(3);

    let mut buf = [0u8; 256];
    let mut enc = EncodeIterator::new(&mut buf).unwrap();
    vector.encode_init(&mut enc).unwrap();
    let mut set = VectorEntry::new(VectorEntryAction::Set, 0);
    set.data = &level;
    set.encode(&mut enc).unwrap();
    VectorEntry::new(VectorEntryAction::Clear, 1)
        .encode(&mut enc)
        .unwrap();
    let mut update = VectorEntry::new(VectorEntryAction::Update, 200);
    update.data = &level;
    update.encode(&mut enc).unwrap();
    Vector::encode_complete(&mut enc, true).unwrap();
    let encoded = enc.encoded().to_vec();

    let mut dec = DecodeIterator::new(&encoded).unwrap();
    let decoded = Vector::decode(&mut dec).unwrap();
    assert!(decoded.supports_sorting);

    let first = VectorEntry::decode(&mut dec, &decoded).unwrap().unwrap();
    assert_eq!((first.action, first.index), (VectorEntryAction::Set, 0));
    assert_eq!(first.data, level.as_slice());
    let second = VectorEntry::decode(&mut dec, &decoded).unwrap().unwrap();
    assert_eq!((second.action, second.index), (VectorEntryAction::Clear, 1));
    assert!(second.data.is_empty());
    let third = VectorEntry::decode(&mut dec, &decoded).unwrap().unwrap();
    assert_eq!(third.index, 200);
    assert!(VectorEntry::decode(&mut dec, &decoded).unwrap().is_none());
}

#[test]
fn filter_list_per_entry_type_override() {
    let mut element_buf = [0u8; 64];
    let mut enc = EncodeIterator::new(&mut element_buf).unwrap();
    ElementList::new().encode_init(&mut enc).unwrap();
    ElementEntry::new(b"Name")
        .encode(&mut enc, &PrimitiveValue::AsciiString(b"svc"))
        .unwrap();
    ElementList::encode_complete(&mut enc, true).unwrap();
    let element_bytes = enc.encoded().to_vec();

    let mut field_buf = [0u8; 64];
    let mut enc = EncodeIterator::new(&mut field_buf).unwrap();
    order_book_level(&mut enc, 5, 5);
    let field_bytes = enc.encoded().to_vec();

    let list = FilterList::new(ContainerType::ElementList);
    let mut buf = [0u8; 256];
    let mut enc = EncodeIterator::new(&mut buf).unwrap();
    list.encode_init(&mut enc).unwrap();
    let mut info = FilterEntry::new(FilterEntryAction::Set, 1);
    info.data = &element_bytes;
    info.encode(&mut enc, list.container_type).unwrap();
    // Second entry overrides the declared type.
    let mut data = FilterEntry::new(FilterEntryAction::Set, 2);
    data.container_type = Some(ContainerType::FieldList);
    data.data = &field_bytes;
    data.encode(&mut enc, list.container_type).unwrap();
    FilterEntry::new(FilterEntryAction::Clear, 3)
        .encode(&mut enc, list.container_type)
        .unwrap();
    FilterList::encode_complete(&mut enc, true).unwrap();
    let encoded = enc.encoded().to_vec();

    let mut dec = DecodeIterator::new(&encoded).unwrap();
    let decoded = FilterList::decode(&mut dec).unwrap();
    assert_eq!(decoded.container_type, ContainerType::ElementList);

    let first = FilterEntry::decode(&mut dec, &decoded).unwrap().unwrap();
    assert_eq!(first.id, 1);
    assert_eq!(first.effective_type(&decoded), ContainerType::ElementList);
    let second = FilterEntry::decode(&mut dec, &decoded).unwrap().unwrap();
    assert_eq!(second.id, 2);
    assert_eq!(second.effective_type(&decoded), ContainerType::FieldList);
    assert_eq!(second.data, field_bytes.as_slice());
    let third = FilterEntry::decode(&mut dec, &decoded).unwrap().unwrap();
    assert_eq!(third.action, FilterEntryAction::Clear);
    assert!(third.data.is_empty());
    assert!(FilterEntry::decode(&mut dec, &decoded).unwrap().is_none());
}

#[test]
fn series_of_element_lists() {
    let series = Series::new(ContainerType::ElementList);
    let mut buf = [0u8; 256];
    let mut enc = EncodeIterator::new(&mut buf).unwrap();
    series.encode_init(&mut enc).unwrap();
    for generation in 1u64..=3 {
        SeriesEntry::encode_init(&mut enc).unwrap();
        ElementList::new().encode_init(&mut enc).unwrap();
        ElementEntry::new(b"gen")
            .encode(&mut enc, &PrimitiveValue::UInt(generation))
            .unwrap();
        ElementList::encode_complete(&mut enc, true).unwrap();
        SeriesEntry::encode_complete(&mut enc, true).unwrap();
    }
    Series::encode_complete(&mut enc, true).unwrap();
    let encoded = enc.encoded().to_vec();

    let mut dec = DecodeIterator::new(&encoded).unwrap();
    Series::decode(&mut dec).unwrap();
    let mut generation = 0u64;
    while let Some(_) = SeriesEntry::decode(&mut dec).unwrap() {
        generation += 1;
        ElementList::decode(&mut dec).unwrap();
        let entry = ElementEntry::decode(&mut dec).unwrap().unwrap();
        assert_eq!(
            entry.value().unwrap(),
            Decoded::Value(PrimitiveValue::UInt(generation))
        );
        assert!(ElementEntry::decode(&mut dec).unwrap().is_none());
    }
    assert_eq!(generation, 3);
}

#[test]
fn series_nested_in_vector_entry() {
    let vector = Vector::new(ContainerType::Series);
    let mut buf = [0u8; 256];
    let mut enc = EncodeIterator::new(&mut buf).unwrap();
    vector.encode_init(&mut enc).unwrap();
    // Entry payload encoded in place rather than spliced.
    VectorEntry::new(VectorEntryAction::Set, 4)
        .encode_init(&mut enc)
        .unwrap();
    let series = Series::new(ContainerType::ElementList);
    series.encode_init(&mut enc).unwrap();
    SeriesEntry::encode_init(&mut enc).unwrap();
    ElementList::new().encode_init(&mut enc).unwrap();
    ElementEntry::new(b"row")
        .encode(&mut enc, &PrimitiveValue::UInt(1))
        .unwrap();
    ElementList::encode_complete(&mut enc, true).unwrap();
    SeriesEntry::encode_complete(&mut enc, true).unwrap();
    Series::encode_complete(&mut enc, true).unwrap();
    VectorEntry::encode_complete(&mut enc, true).unwrap();
    Vector::encode_complete(&mut enc, true).unwrap();
    let encoded = enc.encoded().to_vec();

    let mut dec = DecodeIterator::new(&encoded).unwrap();
    let decoded = Vector::decode(&mut dec).unwrap();
    assert_eq!(decoded.container_type, ContainerType::Series);
    let entry = VectorEntry::decode(&mut dec, &decoded).unwrap().unwrap();
    assert_eq!(entry.index, 4);
    let inner = Series::decode(&mut dec).unwrap();
    assert_eq!(inner.container_type, ContainerType::ElementList);
    assert!(SeriesEntry::decode(&mut dec).unwrap().is_some());
    ElementList::decode(&mut dec).unwrap();
    let element = ElementEntry::decode(&mut dec).unwrap().unwrap();
    assert_eq!(element.name, b"row");
    assert!(ElementEntry::decode(&mut dec).unwrap().is_none());
    assert!(SeriesEntry::decode(&mut dec).unwrap().is_none());
    assert!(VectorEntry::decode(&mut dec, &decoded).unwrap().is_none());
}

#[test]
fn array_in_element_entry() {
    // A view definition: an array of field ids inside an element list.
    let array = Array::fixed(DataType::Int, 2);
    let mut array_buf = [0u8; 32];
    let mut enc = EncodeIterator::new(&mut array_buf).unwrap();
    array.encode_init(&mut enc).unwrap();
    for id in [6i64, 22, 25] {
        array.encode_entry(&mut enc, &PrimitiveValue::Int(id)).unwrap();
    }
    Array::encode_complete(&mut enc, true).unwrap();
    let array_bytes = enc.encoded().to_vec();

    let mut buf = [0u8; 128];
    let mut enc = EncodeIterator::new(&mut buf).unwrap();
    ElementList::new().encode_init(&mut enc).unwrap();
    ElementEntry::new(b":ViewData")
        .encode_pre_encoded(&mut enc, DataType::Array, &array_bytes)
        .unwrap();
    ElementList::encode_complete(&mut enc, true).unwrap();
    let encoded = enc.encoded().to_vec();

    let mut dec = DecodeIterator::new(&encoded).unwrap();
    ElementList::decode(&mut dec).unwrap();
    let entry = ElementEntry::decode(&mut dec).unwrap().unwrap();
    assert_eq!(entry.name, b":ViewData");
    assert_eq!(entry.data_type, DataType::Array);
    let decoded_array = Array::decode(&mut dec).unwrap();
    assert!(!decoded_array.is_variable());
    let mut ids = Vec::new();
    while let Some(item) = ArrayEntry::decode(&mut dec, &decoded_array).unwrap() {
        match item.value(&decoded_array).unwrap() {
            Decoded::Value(PrimitiveValue::Int(id)) => ids.push(id),
            other => panic!("unexpected item: {other:?}"),
        }
    }
    assert_eq!(ids, vec![6, 22, 25]);
}

#[test]
fn malformed_entry_degrades_without_poisoning_the_list() {
    let mut dict = DataDictionary::new();
    dict.add_field(5, "TIMACT", DataType::Time, 5);
    dict.add_field(1, "PROD_PERM", DataType::UInt, 5);

    let mut buf = [0u8; 64];
    let mut enc = EncodeIterator::new(&mut buf).unwrap();
    FieldList::new().encode_init(&mut enc).unwrap();
    // A one-byte payload is not a valid time-of-day.
    FieldEntry::new(5).encode_pre_encoded(&mut enc, &[0x17]).unwrap();
    FieldEntry::new(1).encode(&mut enc, &PrimitiveValue::UInt(7)).unwrap();
    FieldList::encode_complete(&mut enc, true).unwrap();
    let encoded = enc.encoded().to_vec();

    let mut dec = DecodeIterator::new(&encoded).unwrap();
    FieldList::decode(&mut dec).unwrap();
    let bad = FieldEntry::decode(&mut dec).unwrap().unwrap();
    assert!(matches!(bad.load(&dict), FieldLoad::Error(_)));
    let good = FieldEntry::decode(&mut dec).unwrap().unwrap();
    assert_eq!(
        good.load(&dict),
        FieldLoad::Value(Decoded::Value(PrimitiveValue::UInt(7)))
    );
    assert!(FieldEntry::decode(&mut dec).unwrap().is_none());
}

#[test]
fn truncated_container_fails_with_incomplete() {
    let mut buf = [0u8; 64];
    let mut enc = EncodeIterator::new(&mut buf).unwrap();
    order_book_level(&mut enc, 10050, 300);
    let encoded = enc.encoded().to_vec();

    let cut = &encoded[..encoded.len() - 3];
    let mut dec = DecodeIterator::new(cut).unwrap();
    FieldList::decode(&mut dec).unwrap();
    let mut saw_error = false;
    loop {
        match FieldEntry::decode(&mut dec) {
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(CodecError::Incomplete { .. }) => {
                saw_error = true;
                break;
            }
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert!(saw_error);
}

#[test]
fn enum_display_resolution() {
    let mut dict = DataDictionary::new();
    dict.add_field(32, "PRCTCK_1", DataType::Enum, 1);
    dict.add_enum_value(32, 1, "⇧");
    dict.add_enum_value(32, 2, "⇩");

    assert_eq!(dict.enum_display(32, 2).unwrap(), "⇩");
    assert_eq!(dict.field_type(32), Some(DataType::Enum));
    assert!(matches!(
        dict.enum_display(32, 9),
        Err(CodecError::UndefinedEnumDisplay { field_id: 32, value: 9 })
    ));
}
