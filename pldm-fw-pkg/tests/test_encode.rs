// Licensed under the Apache-2.0 license

use chrono::Utc;
use pldm_fw_pkg::manifest::{
    ComponentImageInformation, Descriptor, DescriptorType, FirmwareDeviceIdRecord,
    PackageHeaderInformation, StringType,
};
use pldm_fw_pkg::FirmwareManifest;
use uuid::Uuid;

fn header() -> PackageHeaderInformation {
    PackageHeaderInformation {
        package_header_identifier: Uuid::parse_str("7B291C99-6DB6-4208-801B-02026E463C78")
            .unwrap(),
        package_header_format_revision: 3,
        package_release_date_time: Utc::now(),
        package_version_string_type: StringType::Ascii,
        package_version_string: Some("HGX-H100x8_0002_230517.3.0".to_string()),
        package_header_size: 0,
    }
}

fn component(size: usize) -> ComponentImageInformation {
    ComponentImageInformation {
        image_location: None,
        classification: 0x0001,
        identifier: 0x0010,
        comparison_stamp: Some(12345),
        options: 0x0003,
        requested_activation_method: 0x0007,
        version_string_type: StringType::Ascii,
        version_string: Some("v1.0.0".to_string()),
        opaque_data: Some(vec![0xAA, 0xBB, 0xCC, 0xDD]),
        offset: 0,
        size: 0,
        image_data: Some(vec![0x11u8; size]),
    }
}

fn record(applicable_components: Vec<u8>) -> FirmwareDeviceIdRecord {
    FirmwareDeviceIdRecord {
        firmware_device_package_data: Some(vec![0xAA, 0xBB, 0xCC, 0xDD]),
        device_update_option_flags: 1,
        component_image_set_version_string_type: StringType::Ascii,
        component_image_set_version_string: Some("Firmware v1".to_string()),
        applicable_components: Some(applicable_components),
        initial_descriptor: Descriptor {
            descriptor_type: DescriptorType::PciVendorId,
            descriptor_data: vec![0x01, 0x02, 0x03, 0x04],
        },
        additional_descriptors: Some(vec![Descriptor {
            descriptor_type: DescriptorType::PciDeviceId,
            descriptor_data: vec![0x10, 0x20],
        }]),
        reference_manifest_data: None,
    }
}

#[test]
fn encodes_manifest_with_multiple_components() {
    let manifest = FirmwareManifest {
        package_header_information: header(),
        firmware_device_id_records: vec![record(vec![0, 1])],
        downstream_device_id_records: None,
        component_image_information: vec![component(128), component(512)],
    };

    manifest.verify().expect("manifest should be valid");
    let package = manifest.encode().expect("encode should succeed");

    let decoded = FirmwareManifest::parse(&package).expect("parse should succeed");
    assert_eq!(decoded.component_image_information.len(), 2);
    assert_eq!(
        decoded.component_image_information[0].image_data.as_ref().unwrap().len(),
        128
    );
    assert_eq!(
        decoded.component_image_information[1].image_data.as_ref().unwrap().len(),
        512
    );
}

#[test]
fn verify_rejects_applicable_component_index_out_of_range() {
    let manifest = FirmwareManifest {
        package_header_information: header(),
        // Only one component exists (index 0), but the record claims index 5.
        firmware_device_id_records: vec![record(vec![5])],
        downstream_device_id_records: None,
        component_image_information: vec![component(64)],
    };

    assert!(manifest.verify().is_err());
}

#[test]
fn verify_rejects_wrong_pldm_version_uuid() {
    let mut manifest = FirmwareManifest {
        package_header_information: header(),
        firmware_device_id_records: vec![record(vec![0])],
        downstream_device_id_records: None,
        component_image_information: vec![component(64)],
    };
    manifest.package_header_information.package_header_identifier = Uuid::nil();

    assert!(manifest.verify().is_err());
}

#[test]
fn verify_rejects_component_with_no_image_source() {
    let mut manifest = FirmwareManifest {
        package_header_information: header(),
        firmware_device_id_records: vec![record(vec![0])],
        downstream_device_id_records: None,
        component_image_information: vec![component(64)],
    };
    manifest.component_image_information[0].image_data = None;

    assert!(manifest.verify().is_err());
}

#[test]
fn encode_rejects_component_missing_image_data() {
    let manifest = FirmwareManifest {
        package_header_information: header(),
        firmware_device_id_records: vec![record(vec![0])],
        downstream_device_id_records: None,
        component_image_information: vec![ComponentImageInformation {
            image_data: None,
            ..component(64)
        }],
    };

    assert!(manifest.encode().is_err());
}
