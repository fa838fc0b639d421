use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use rand::prelude::*;
use uproperty::*;

fn record() -> Arc<UScriptStruct> {
    let vector = StructBuilder::script_struct("BenchVector")
        .property(UProperty::float("X"))
        .property(UProperty::float("Y"))
        .property(UProperty::float("Z"))
        .build()
        .unwrap();
    StructBuilder::script_struct("BenchRecord")
        .property(UProperty::int("Id"))
        .property(UProperty::double("Weight"))
        .property(UProperty::str("Label"))
        .property(UProperty::script_struct("Location", &vector))
        .property(UProperty::int("Slots").with_array_dim(4))
        .property(UProperty::array("Samples", UProperty::float("Samples")))
        .property(UProperty::bitfield("bActive"))
        .build()
        .unwrap()
}

unsafe fn randomize(record: &UScriptStruct, data: *mut u8, rng: &mut impl Rng) {
    let find = |name: &str| record.find_property(FName::new(name)).unwrap();
    TypeFundamentals::<i32>::set_property_value(find("Id").container_ptr_to_value_ptr(data, 0), rng.gen());
    TypeFundamentals::<f64>::set_property_value(
        find("Weight").container_ptr_to_value_ptr(data, 0),
        rng.gen(),
    );
    let label: String = (0..24).map(|_| rng.gen_range('a'..='z')).collect();
    TypeFundamentals::<FString>::set_property_value(
        find("Label").container_ptr_to_value_ptr(data, 0),
        FString::from(label.as_str()),
    );
    let slots = find("Slots");
    for index in 0..slots.array_dim() {
        TypeFundamentals::<i32>::set_property_value(slots.container_ptr_to_value_ptr(data, index), rng.gen());
    }
    let samples = find("Samples");
    let mut helper = FScriptArrayHelper::new_in_container(&samples, data, 0).unwrap();
    let count = helper.add_values(256);
    for index in count..count + 256 {
        TypeFundamentals::<f32>::set_property_value(helper.get_raw_ptr(index), rng.gen());
    }
    let active = find("bActive");
    if let PropertyKind::Bool(bool_property) = active.kind() {
        bool_property.set_property_value(active.container_ptr_to_value_ptr(data, 0), rng.gen());
    }
}

fn serialize(c: &mut Criterion) {
    let record = record();
    let objects = FUObjectArray::new();
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let value = FStructOnScope::new(&record).unwrap();
    let defaults = FStructOnScope::new(&record).unwrap();
    unsafe { randomize(&record, value.get_struct_memory(), &mut rng) };

    c.bench_function("tagged save", |b| {
        b.iter(|| {
            let mut writer = MemoryWriter::new();
            unsafe {
                record.serialize_tagged_properties(
                    &mut writer,
                    value.get_struct_memory(),
                    Some(&record),
                    Some(defaults.get_struct_memory()),
                )
            }
            .unwrap();
            writer.into_bytes()
        })
    });

    let mut writer = MemoryWriter::new();
    unsafe {
        record.serialize_tagged_properties(
            &mut writer,
            value.get_struct_memory(),
            Some(&record),
            Some(defaults.get_struct_memory()),
        )
    }
    .unwrap();
    let tagged = writer.into_bytes();
    c.bench_function("tagged load", |b| {
        b.iter(|| {
            let loaded = FStructOnScope::new(&record).unwrap();
            let mut reader = MemoryReader::new(&tagged);
            unsafe { record.serialize_tagged_properties(&mut reader, loaded.get_struct_memory(), None, None) }
                .unwrap();
        })
    });

    c.bench_function("binary save", |b| {
        b.iter(|| {
            let mut writer = MemoryWriter::new().binary();
            unsafe { record.serialize_bin(&mut writer, value.get_struct_memory()) }.unwrap();
            writer.into_bytes()
        })
    });

    let mut text = String::new();
    unsafe {
        record.export_text(
            &mut text,
            value.get_struct_memory(),
            Some(defaults.get_struct_memory()),
            EPropertyPortFlags::PPF_None,
            &objects,
        )
    };
    c.bench_function("text export", |b| {
        b.iter(|| {
            let mut out = String::new();
            unsafe {
                record.export_text(
                    &mut out,
                    value.get_struct_memory(),
                    Some(defaults.get_struct_memory()),
                    EPropertyPortFlags::PPF_None,
                    &objects,
                )
            };
            out
        })
    });
    c.bench_function("text import", |b| {
        b.iter(|| {
            let loaded = FStructOnScope::new(&record).unwrap();
            let mut errors = FStringOutputDevice::new();
            unsafe {
                record.import_text(
                    &text,
                    loaded.get_struct_memory(),
                    EPropertyPortFlags::PPF_None,
                    &objects,
                    &mut errors,
                )
            }
            .unwrap();
            assert!(errors.is_empty());
        })
    });
}

criterion_group!(benches, serialize);
criterion_main!(benches);
