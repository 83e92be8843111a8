/*++

Licensed under the Apache-2.0 license.

--*/
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;
use num_traits::ToPrimitive;
use serde::de::{self, Error as DeError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::io::Write;
use std::str::FromStr;
use uuid::Uuid;

use crc::{Crc, CRC_32_ISO_HDLC};

use crate::error::ParseError;

/// A cursor over an immutable byte slice. The package parser never performs
/// I/O of its own; callers hand it a buffer (read from a file, a socket, wherever)
/// and every offset below is computed against that buffer.
struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        ByteReader { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ParseError> {
        let available = self.data.len() - self.pos;
        if len > available {
            return Err(ParseError::UnexpectedEof {
                needed: len,
                available,
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, ParseError> {
        Ok(self.take(1)?[0])
    }

    fn u16_le(&mut self) -> Result<u16, ParseError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32_le(&mut self) -> Result<u32, ParseError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn array13(&mut self) -> Result<[u8; 13], ParseError> {
        let b = self.take(13)?;
        let mut out = [0u8; 13];
        out.copy_from_slice(b);
        Ok(out)
    }

    fn position(&self) -> usize {
        self.pos
    }
}

#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct FirmwareManifest {
    pub package_header_information: PackageHeaderInformation,
    pub firmware_device_id_records: Vec<FirmwareDeviceIdRecord>,
    pub downstream_device_id_records: Option<Vec<DownstreamDeviceIdRecord>>,
    pub component_image_information: Vec<ComponentImageInformation>,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct PackageHeaderInformation {
    pub package_header_identifier: Uuid,
    pub package_header_format_revision: u8,
    pub package_release_date_time: DateTime<Utc>,
    pub package_version_string_type: StringType,
    pub package_version_string: Option<String>,
    #[serde(skip)]
    pub package_header_size: u16,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct FirmwareDeviceIdRecord {
    pub firmware_device_package_data: Option<Vec<u8>>,
    pub device_update_option_flags: u32,
    pub component_image_set_version_string_type: StringType,
    pub component_image_set_version_string: Option<String>,
    pub applicable_components: Option<Vec<u8>>,
    pub initial_descriptor: Descriptor,
    pub additional_descriptors: Option<Vec<Descriptor>>,
    pub reference_manifest_data: Option<Vec<u8>>,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct DownstreamDeviceIdRecord {
    pub update_option_flags: u32,
    pub self_contained_activation_min_version_string_type: StringType,
    pub applicable_components: Option<Vec<u8>>,
    pub self_contained_activation_min_version_string: Option<String>,
    pub self_contained_activation_min_version_comparison_stamp: Option<u32>,
    pub record_descriptors: Vec<Descriptor>,
    pub package_data: Option<Vec<u8>>,
    pub reference_manifest_data: Option<Vec<u8>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ComponentImageInformation {
    pub image_location: Option<String>,
    pub classification: u16,
    pub identifier: u16,
    pub comparison_stamp: Option<u32>,
    pub options: u16,
    pub requested_activation_method: u16,
    pub version_string_type: StringType,
    pub version_string: Option<String>,
    pub opaque_data: Option<Vec<u8>>,
    #[serde(skip)]
    pub offset: u32,
    #[serde(skip)]
    pub size: u32,
    #[serde(skip)]
    pub image_data: Option<Vec<u8>>,
}

#[derive(Debug, PartialEq, Clone, Copy)]
enum PldmVersion {
    Version10,
    Version11,
    Version12,
    Version13,
    Unknown,
}

impl PldmVersion {
    fn get_uuid(&self) -> Option<Uuid> {
        match self {
            PldmVersion::Version13 => Uuid::from_str("7B291C996DB64208801B02026E463C78").ok(),
            PldmVersion::Version12 => Uuid::from_str("3119CE2FE80A4A99AF6D46F8B121F6BF").ok(),
            PldmVersion::Version11 => Uuid::from_str("1244D2648D7D4718A030FC8A56587D5A").ok(),
            PldmVersion::Version10 => Uuid::from_str("F018878CCB7D49439800A02F059ACA02").ok(),
            PldmVersion::Unknown => None,
        }
    }
}

fn get_pldm_version(uuid: Uuid) -> PldmVersion {
    match uuid.to_string().replace("-", "").to_uppercase().as_str() {
        "7B291C996DB64208801B02026E463C78" => PldmVersion::Version13,
        "3119CE2FE80A4A99AF6D46F8B121F6BF" => PldmVersion::Version12,
        "1244D2648D7D4718A030FC8A56587D5A" => PldmVersion::Version11,
        "F018878CCB7D49439800A02F059ACA02" => PldmVersion::Version10,
        _ => PldmVersion::Unknown,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, FromPrimitive, ToPrimitive, Default)]
pub enum DescriptorType {
    PciVendorId = 0x0000,
    IanaEnterpriseId = 0x0001,
    Uuid = 0x0002,
    PnpVendorId = 0x0003,
    AcpiVendorId = 0x0004,
    IeeeAssignedCompanyId = 0x0005,
    ScsiVendorId = 0x0006,
    PciDeviceId = 0x0100,
    PciSubsystemVendorId = 0x0101,
    PciSubsystemId = 0x0102,
    PciRevisionId = 0x0103,
    PnpProductIdentifier = 0x0104,
    AcpiProductIdentifier = 0x0105,
    AsciiModelNumberLong = 0x0106,
    AsciiModelNumberShort = 0x0107,
    ScsiProductId = 0x0108,
    UbmControllerDeviceCode = 0x0109,
    IeeeEui64Id = 0x010A,
    PciRevisionIdRange = 0x010B,
    VendorDefined = 0x8000,
    #[default]
    Unknown = 0xFFFF,
}

impl DescriptorType {
    fn as_string(&self) -> &str {
        match *self {
            DescriptorType::PciVendorId => "PCI_VENDOR_ID",
            DescriptorType::IanaEnterpriseId => "IANA_ENTERPRISE_ID",
            DescriptorType::Uuid => "UUID",
            DescriptorType::PnpVendorId => "PNP_VENDOR_ID",
            DescriptorType::AcpiVendorId => "ACPI_VENDOR_ID",
            DescriptorType::IeeeAssignedCompanyId => "IEEE_ASSIGNED_COMPANY_ID",
            DescriptorType::ScsiVendorId => "SCSI_VENDOR_ID",
            DescriptorType::PciDeviceId => "PCI_DEVICE_ID",
            DescriptorType::PciSubsystemVendorId => "PCI_SUBSYSTEM_VENDOR_ID",
            DescriptorType::PciSubsystemId => "PCI_SUBSYSTEM_ID",
            DescriptorType::PciRevisionId => "PCI_REVISION_ID",
            DescriptorType::PnpProductIdentifier => "PNP_PRODUCT_IDENTIFIER",
            DescriptorType::AcpiProductIdentifier => "ACPI_PRODUCT_IDENTIFIER",
            DescriptorType::AsciiModelNumberLong => "ASCII_MODEL_NUMBER_LONG",
            DescriptorType::AsciiModelNumberShort => "ASCII_MODEL_NUMBER_SHORT",
            DescriptorType::ScsiProductId => "SCSI_PRODUCT_ID",
            DescriptorType::UbmControllerDeviceCode => "UBM_CONTROLLER_DEVICE_CODE",
            DescriptorType::IeeeEui64Id => "IEEE_EUI_64_ID",
            DescriptorType::PciRevisionIdRange => "PCI_REVISION_ID_RANGE",
            DescriptorType::VendorDefined => "VENDOR_DEFINED",
            _ => "UNKNOWN",
        }
    }
}

impl fmt::Display for DescriptorType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl Serialize for DescriptorType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_string())
    }
}

impl FromStr for DescriptorType {
    type Err = String;

    fn from_str(input: &str) -> Result<DescriptorType, Self::Err> {
        match input.to_uppercase().as_str() {
            "PCI_VENDOR_ID" => Ok(DescriptorType::PciVendorId),
            "IANA_ENTERPRISE_ID" => Ok(DescriptorType::IanaEnterpriseId),
            "UUID" => Ok(DescriptorType::Uuid),
            "PNP_VENDOR_ID" => Ok(DescriptorType::PnpVendorId),
            "ACPI_VENDOR_ID" => Ok(DescriptorType::AcpiVendorId),
            "IEEE_ASSIGNED_COMPANY_ID" => Ok(DescriptorType::IeeeAssignedCompanyId),
            "SCSI_VENDOR_ID" => Ok(DescriptorType::ScsiVendorId),
            "PCI_DEVICE_ID" => Ok(DescriptorType::PciDeviceId),
            "PCI_SUBSYSTEM_VENDOR_ID" => Ok(DescriptorType::PciSubsystemVendorId),
            "PCI_SUBSYSTEM_ID" => Ok(DescriptorType::PciSubsystemId),
            "PCI_REVISION_ID" => Ok(DescriptorType::PciRevisionId),
            "PNP_PRODUCT_IDENTIFIER" => Ok(DescriptorType::PnpProductIdentifier),
            "ACPI_PRODUCT_IDENTIFIER" => Ok(DescriptorType::AcpiProductIdentifier),
            "ASCII_MODEL_NUMBER_LONG" => Ok(DescriptorType::AsciiModelNumberLong),
            "ASCII_MODEL_NUMBER_SHORT" => Ok(DescriptorType::AsciiModelNumberShort),
            "SCSI_PRODUCT_ID" => Ok(DescriptorType::ScsiProductId),
            "UBM_CONTROLLER_DEVICE_CODE" => Ok(DescriptorType::UbmControllerDeviceCode),
            "IEEE_EUI_64_ID" => Ok(DescriptorType::IeeeEui64Id),
            "PCI_REVISION_ID_RANGE" => Ok(DescriptorType::PciRevisionIdRange),
            "VENDOR_DEFINED" => Ok(DescriptorType::VendorDefined),
            _ => Err(format!("invalid descriptor type: {}", input)),
        }
    }
}

impl<'de> Deserialize<'de> for DescriptorType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DescriptorType::from_str(&s).map_err(DeError::custom)
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Default, Clone)]
pub struct Descriptor {
    pub descriptor_type: DescriptorType,
    pub descriptor_data: Vec<u8>,
}

#[derive(Debug, Copy, Clone, PartialEq, FromPrimitive, ToPrimitive, Default)]
pub enum StringType {
    Unknown = 0,
    Ascii = 1,
    #[default]
    Utf8 = 2,
    Utf16 = 3,
    Utf16Le = 4,
    Utf16Be = 5,
}

impl StringType {
    fn as_string(&self) -> &str {
        match *self {
            StringType::Ascii => "ASCII",
            StringType::Utf8 => "UTF-8",
            StringType::Utf16 => "UTF-16",
            StringType::Utf16Le => "UTF-16LE",
            StringType::Utf16Be => "UTF-16BE",
            _ => "UNKNOWN",
        }
    }
}

impl fmt::Display for StringType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl FromStr for StringType {
    type Err = String;

    fn from_str(input: &str) -> Result<StringType, Self::Err> {
        match input.to_uppercase().as_str() {
            "ASCII" => Ok(StringType::Ascii),
            "UTF-8" => Ok(StringType::Utf8),
            "UTF-16" => Ok(StringType::Utf16),
            "UTF-16LE" => Ok(StringType::Utf16Le),
            "UTF-16BE" => Ok(StringType::Utf16Be),
            _ => Err(format!("invalid string type: {}", input)),
        }
    }
}

impl<'de> Deserialize<'de> for StringType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        StringType::from_str(&s).map_err(de::Error::custom)
    }
}

impl Serialize for StringType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_string())
    }
}

#[derive(Debug)]
pub struct Timestamp104 {
    pub data: [u8; 13],
}

impl Timestamp104 {
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        let mut data = [0u8; 13];
        data[12] = (3 << 4) | 6;

        let year = dt.year() as u16;
        data[10] = (year & 0xFF) as u8;
        data[11] = (year >> 8) as u8;
        data[9] = dt.month() as u8;
        data[8] = dt.day() as u8;
        data[7] = dt.hour() as u8;
        data[6] = dt.minute() as u8;
        data[5] = dt.second() as u8;

        let microseconds = dt.timestamp_subsec_micros();
        data[2] = (microseconds & 0xFF) as u8;
        data[3] = ((microseconds >> 8) & 0xFF) as u8;
        data[4] = ((microseconds >> 16) & 0xFF) as u8;

        data[0] = 0;
        data[1] = 0;

        Timestamp104 { data }
    }

    pub fn encode(&self, buffer: &mut Vec<u8>) -> Result<(), ParseError> {
        buffer.write_all(&self.data)?;
        Ok(())
    }

    fn decode(reader: &mut ByteReader) -> Result<Self, ParseError> {
        Ok(Timestamp104 {
            data: reader.array13()?,
        })
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let year = u16::from_le_bytes([self.data[10], self.data[11]]) as i32;
        let month = self.data[9] as u32;
        let day = self.data[8] as u32;
        let hour = self.data[7] as u32;
        let minute = self.data[6] as u32;
        let second = self.data[5] as u32;
        let microseconds = u32::from_le_bytes([self.data[2], self.data[3], self.data[4], 0]);

        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        let time = NaiveTime::from_hms_micro_opt(hour, minute, second, microseconds)?;
        let naive_datetime = NaiveDateTime::new(date, time);
        Some(DateTime::from_naive_utc_and_offset(naive_datetime, Utc))
    }
}

impl FirmwareManifest {
    pub fn verify(&self) -> Result<(), String> {
        let component_count = self.component_image_information.len();

        self.package_header_information.verify()?;

        for (index, record) in self.firmware_device_id_records.iter().enumerate() {
            if let Err(e) = record.verify(component_count) {
                return Err(format!("firmware_device_id_records[{}]: {}", index, e));
            }
        }

        if let Some(downstream_device_id_records) = &self.downstream_device_id_records {
            for (index, record) in downstream_device_id_records.iter().enumerate() {
                if let Err(e) = record.verify(component_count) {
                    return Err(format!("downstream_device_id_records[{}]: {}", index, e));
                }
            }
        }

        for (index, component) in self.component_image_information.iter().enumerate() {
            if let Err(e) = component.verify() {
                return Err(format!("component_image_information[{}]: {}", index, e));
            }
        }

        Ok(())
    }

    /// Encodes this manifest into a complete PLDM firmware package, header
    /// through trailing component images, as an in-memory buffer. Every
    /// component's `image_data` must already be populated; this function
    /// performs no file I/O.
    pub fn encode(&self) -> Result<Vec<u8>, ParseError> {
        let mut buffer: Vec<u8> = Vec::new();

        self.package_header_information.encode(
            &mut buffer,
            &self.firmware_device_id_records,
            &self.downstream_device_id_records,
            &self.component_image_information,
        )?;

        let component_bitmap_bit_length = self.component_image_information.len() as u16;

        let num_firmware_records = self.firmware_device_id_records.len() as u8;
        buffer.push(num_firmware_records);
        for record in &self.firmware_device_id_records {
            record.encode(&mut buffer, component_bitmap_bit_length)?;
        }

        if let Some(downstream_device_id_records) = &self.downstream_device_id_records {
            let num_downstream_records = downstream_device_id_records.len() as u8;
            buffer.push(num_downstream_records);
            for record in downstream_device_id_records {
                record.encode(&mut buffer, component_bitmap_bit_length)?;
            }
        } else {
            buffer.push(0);
        }

        let num_components = self.component_image_information.len() as u16;
        let mut offset = self.package_header_information.get_header_size(
            &self.firmware_device_id_records,
            &self.downstream_device_id_records,
            &self.component_image_information,
        ) as u32;
        buffer.write_all(&num_components.to_le_bytes())?;

        let mut image_data: Vec<u8> = Vec::new();
        for component in &self.component_image_information {
            let data = component
                .image_data
                .as_ref()
                .ok_or_else(|| ParseError::Invalid("component has no image data loaded".into()))?;
            offset += component.encode(&mut buffer, offset, data.len() as u32)?;
            image_data.extend_from_slice(data);
        }

        let crc32 = Crc::<u32>::new(&CRC_32_ISO_HDLC);
        let package_header_checksum = crc32.checksum(&buffer);
        let pldm_fw_package_payload_checksum = crc32.checksum(&image_data);

        buffer.write_all(&package_header_checksum.to_le_bytes())?;
        buffer.write_all(&pldm_fw_package_payload_checksum.to_le_bytes())?;
        buffer.write_all(&image_data)?;

        Ok(buffer)
    }

    /// Parses a complete PLDM firmware package out of `data`. This is the
    /// only entry point into the binary format; it never touches a file or
    /// socket itself, only the slice it is given.
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let mut reader = ByteReader::new(data);

        let (package_header_information, component_bitmap_length) =
            PackageHeaderInformation::decode(&mut reader)?;

        let pldm_version = get_pldm_version(package_header_information.package_header_identifier);
        if pldm_version == PldmVersion::Unknown {
            return Err(ParseError::UnknownPackageVersion(
                package_header_information.package_header_identifier,
            ));
        }

        let num_firmware_records = reader.u8()?;
        let mut firmware_device_id_records = Vec::new();
        for _ in 0..num_firmware_records {
            firmware_device_id_records.push(FirmwareDeviceIdRecord::decode(
                &mut reader,
                component_bitmap_length,
                pldm_version,
            )?);
        }

        let mut downstream_device_id_records = Vec::new();
        if matches!(
            pldm_version,
            PldmVersion::Version11 | PldmVersion::Version12 | PldmVersion::Version13
        ) {
            let num_downstream_records = reader.u8()?;
            for _ in 0..num_downstream_records {
                downstream_device_id_records.push(DownstreamDeviceIdRecord::decode(
                    &mut reader,
                    component_bitmap_length,
                    pldm_version,
                )?);
            }
        }
        let downstream_device_id_records = if downstream_device_id_records.is_empty() {
            None
        } else {
            Some(downstream_device_id_records)
        };

        let num_components = reader.u16_le()?;
        let mut component_image_information = Vec::new();
        for _ in 0..num_components {
            component_image_information.push(ComponentImageInformation::decode(
                &mut reader,
                pldm_version,
            )?);
        }

        let header_end = reader.position();
        let declared_header_size = package_header_information.package_header_size;
        if declared_header_size as usize != header_end {
            return Err(ParseError::HeaderSizeMismatch {
                declared: declared_header_size,
                computed: header_end as u16,
            });
        }

        let header_checksum = reader.u32_le()?;
        let crc32 = Crc::<u32>::new(&CRC_32_ISO_HDLC);
        let computed_header_checksum = crc32.checksum(&data[..header_end]);
        if header_checksum != computed_header_checksum {
            return Err(ParseError::HeaderChecksumMismatch {
                expected: header_checksum,
                computed: computed_header_checksum,
            });
        }

        let payload_checksum = if pldm_version == PldmVersion::Version13 {
            Some(reader.u32_le()?)
        } else {
            None
        };

        let payload_start = reader.position();
        for component in component_image_information.iter_mut() {
            let size = component.size as usize;
            let slice = reader.take(size)?;
            component.image_data = Some(slice.to_vec());
        }
        let payload_end = reader.position();

        if let Some(expected) = payload_checksum {
            let computed = crc32.checksum(&data[payload_start..payload_end]);
            if expected != computed {
                return Err(ParseError::PayloadChecksumMismatch {
                    expected,
                    computed,
                });
            }
        }

        Ok(FirmwareManifest {
            package_header_information,
            firmware_device_id_records,
            downstream_device_id_records,
            component_image_information,
        })
    }
}

impl PackageHeaderInformation {
    fn get_header_size(
        &self,
        firmware_device_records: &[FirmwareDeviceIdRecord],
        downstream_device_records: &Option<Vec<DownstreamDeviceIdRecord>>,
        component_image_information: &[ComponentImageInformation],
    ) -> u16 {
        let mut size = 0;
        size += 16; // package_header_identifier
        size += 1; // package_header_format_revision
        size += 2; // header size
        size += 13; // package_release_date_time
        size += 2; // component_bitmap_bit_length
        size += 1; // package_version_string_type
        size += 1; // package_version_string_length
        if let Some(ref version_string) = self.package_version_string {
            size += version_string.len() as u16;
        }

        let component_bitmap_length = component_image_information.len() as u16;
        size += 1; // device_id_record_count
        for record in firmware_device_records {
            size += record.total_bytes(component_bitmap_length) as u16;
        }

        size += 1; // downstream device_id_record_count
        if let Some(downstream_device_records) = downstream_device_records {
            for record in downstream_device_records {
                size += record.total_bytes(component_bitmap_length) as u16;
            }
        }

        size += 2; // component_image_information_count
        for component in component_image_information {
            size += component.total_bytes() as u16;
        }

        size
    }

    fn encode(
        &self,
        buffer: &mut Vec<u8>,
        firmware_device_record: &[FirmwareDeviceIdRecord],
        downstream_device_record: &Option<Vec<DownstreamDeviceIdRecord>>,
        component_image_information: &[ComponentImageInformation],
    ) -> Result<(), ParseError> {
        let version13_uuid = PldmVersion::Version13.get_uuid().unwrap();
        buffer.write_all(version13_uuid.as_bytes())?;
        buffer.write_all(&self.package_header_format_revision.to_le_bytes())?;
        let header_size = self.get_header_size(
            firmware_device_record,
            downstream_device_record,
            component_image_information,
        );
        buffer.write_all(&header_size.to_le_bytes())?;

        let timestamp: Timestamp104 = Timestamp104::from_datetime(self.package_release_date_time);
        timestamp.encode(buffer)?;

        let component_bitmap_bit_length = component_image_information.len() as u16;
        buffer.write_all(&component_bitmap_bit_length.to_le_bytes())?;
        buffer.push(self.package_version_string_type.to_u8().unwrap_or(0));

        if let Some(ref version_string) = self.package_version_string {
            buffer.push(version_string.len() as u8);
            buffer.write_all(version_string.as_bytes())?;
        } else {
            buffer.push(0);
        }

        Ok(())
    }

    fn decode(reader: &mut ByteReader) -> Result<(Self, u16), ParseError> {
        let package_header_identifier = Uuid::from_bytes(reader.take(16)?.try_into().unwrap());
        let package_header_format_revision = reader.u8()?;
        let package_header_size = reader.u16_le()?;
        let package_release_date_time = Timestamp104::decode(reader)?
            .to_datetime()
            .ok_or_else(|| ParseError::Invalid("invalid package release timestamp".into()))?;
        let component_bitmap_bit_length = reader.u16_le()?;

        let package_version_string_type =
            StringType::from_u8(reader.u8()?).unwrap_or(StringType::Unknown);
        let package_version_string_length = reader.u8()?;
        let version_string_bytes = reader.take(package_version_string_length as usize)?;
        let package_version_string = if version_string_bytes.is_empty() {
            None
        } else {
            Some(
                String::from_utf8(version_string_bytes.to_vec())
                    .map_err(|_| ParseError::InvalidVersionString)?,
            )
        };

        Ok((
            PackageHeaderInformation {
                package_header_identifier,
                package_header_format_revision,
                package_release_date_time,
                package_version_string_type,
                package_version_string,
                package_header_size,
            },
            component_bitmap_bit_length,
        ))
    }

    pub fn verify(&self) -> Result<(), String> {
        let pldm_version = get_pldm_version(self.package_header_identifier);
        if pldm_version != PldmVersion::Version13 {
            return Err(format!(
                "only v1.3 PLDM format is supported, got UUID {}",
                self.package_header_identifier
            ));
        }

        if let Some(ref version_string) = self.package_version_string {
            if version_string.len() > 255 {
                return Err(format!(
                    "package version string length exceeds 255: {}",
                    version_string.len()
                ));
            }
        }

        Ok(())
    }
}

fn encode_applicable_components(components: &Option<Vec<u8>>, bitmap_bit_length: u16) -> Vec<u8> {
    let mut bitmap = vec![0u8; bitmap_bit_length.div_ceil(8) as usize];
    if let Some(ref components) = components {
        for &component in components {
            if component < bitmap_bit_length as u8 {
                let byte_index = component as usize / 8;
                let bit_index = component % 8;
                bitmap[byte_index] |= 1 << bit_index;
            }
        }
    }
    bitmap
}

fn decode_applicable_components(bitmap: &[u8], bitmap_bit_length: u16) -> Option<Vec<u8>> {
    let mut applicable_components = Vec::new();
    for (byte_index, &byte) in bitmap.iter().enumerate() {
        for bit_index in 0..8 {
            if byte & (1 << bit_index) != 0 {
                let component_index = (byte_index * 8 + bit_index) as u8;
                if component_index < bitmap_bit_length as u8 {
                    applicable_components.push(component_index);
                }
            }
        }
    }
    if applicable_components.is_empty() {
        None
    } else {
        Some(applicable_components)
    }
}

impl FirmwareDeviceIdRecord {
    pub fn encode(&self, buffer: &mut Vec<u8>, component_bitmap_length: u16) -> Result<(), ParseError> {
        let record_length = self.total_bytes(component_bitmap_length) as u16;
        buffer.write_all(&record_length.to_le_bytes())?;

        if let Some(additional_descriptors) = &self.additional_descriptors {
            buffer.push(1u8 + additional_descriptors.len() as u8);
        } else {
            buffer.push(1u8);
        }

        buffer.write_all(&self.device_update_option_flags.to_le_bytes())?;
        buffer.push(
            self.component_image_set_version_string_type
                .to_u8()
                .unwrap_or(0),
        );

        let version_string_length = self
            .component_image_set_version_string
            .as_ref()
            .map(|s| s.len() as u8)
            .unwrap_or(0);
        buffer.push(version_string_length);

        if let Some(firmware_package_data_ref) = &self.firmware_device_package_data {
            buffer.write_all(&(firmware_package_data_ref.len() as u16).to_le_bytes())?;
        } else {
            buffer.write_all(&0u16.to_le_bytes())?;
        }

        if let Some(reference_manifest_data_ref) = &self.reference_manifest_data {
            buffer.write_all(&(reference_manifest_data_ref.len() as u32).to_le_bytes())?;
        } else {
            buffer.write_all(&0u32.to_le_bytes())?;
        }

        buffer.write_all(&encode_applicable_components(
            &self.applicable_components,
            component_bitmap_length,
        ))?;

        if let Some(version_string) = &self.component_image_set_version_string {
            buffer.write_all(version_string.as_bytes())?;
        }

        self.initial_descriptor.encode(buffer)?;

        if let Some(additional_descriptors) = &self.additional_descriptors {
            for descriptor in additional_descriptors {
                descriptor.encode(buffer)?;
            }
        }

        if let Some(package_data) = &self.firmware_device_package_data {
            buffer.write_all(package_data)?;
        }

        if let Some(manifest_data) = &self.reference_manifest_data {
            buffer.write_all(manifest_data)?;
        }

        Ok(())
    }

    fn decode(
        reader: &mut ByteReader,
        component_bitmap_length: u16,
        pldm_version: PldmVersion,
    ) -> Result<Self, ParseError> {
        let _record_length = reader.u16_le()?;
        let descriptor_count = reader.u8()?;
        let device_update_option_flags = reader.u32_le()?;
        let component_image_set_version_string_type =
            StringType::from_u8(reader.u8()?).unwrap_or(StringType::Unknown);
        let component_image_set_version_string_length = reader.u8()?;
        let firmware_device_package_data_length = reader.u16_le()?;

        let reference_manifest_length = if pldm_version == PldmVersion::Version13 {
            reader.u32_le()?
        } else {
            0
        };

        let bitmap = reader.take(component_bitmap_length.div_ceil(8) as usize)?;
        let applicable_components = decode_applicable_components(bitmap, component_bitmap_length);

        let component_image_set_version_string =
            if component_image_set_version_string_length > 0 {
                let bytes = reader.take(component_image_set_version_string_length as usize)?;
                Some(
                    String::from_utf8(bytes.to_vec())
                        .map_err(|_| ParseError::InvalidVersionString)?,
                )
            } else {
                None
            };

        let initial_descriptor = Descriptor::decode(reader)?;

        let mut additional_descriptors = Vec::with_capacity((descriptor_count - 1) as usize);
        for _ in 0..descriptor_count.saturating_sub(1) {
            additional_descriptors.push(Descriptor::decode(reader)?);
        }
        let additional_descriptors = if additional_descriptors.is_empty() {
            None
        } else {
            Some(additional_descriptors)
        };

        let firmware_device_package_data = if firmware_device_package_data_length > 0 {
            Some(reader.take(firmware_device_package_data_length as usize)?.to_vec())
        } else {
            None
        };

        let reference_manifest_data =
            if reference_manifest_length > 0 && pldm_version == PldmVersion::Version13 {
                Some(reader.take(reference_manifest_length as usize)?.to_vec())
            } else {
                None
            };

        Ok(FirmwareDeviceIdRecord {
            device_update_option_flags,
            component_image_set_version_string_type,
            applicable_components,
            component_image_set_version_string,
            initial_descriptor,
            additional_descriptors,
            firmware_device_package_data,
            reference_manifest_data,
        })
    }

    pub fn total_bytes(&self, component_bitmap_length: u16) -> usize {
        let mut total_size = 0;
        total_size += 2; // record_length
        total_size += 1; // descriptor_count
        total_size += 4; // device_update_option_flags
        total_size += 1; // component_image_set_version_string_type
        total_size += 1; // component_image_set_version_string_length
        total_size += 2; // firmware_device_package_data_length
        total_size += 4; // reference_manifest_length
        total_size += component_bitmap_length.div_ceil(8) as usize;

        if let Some(ref version_string) = self.component_image_set_version_string {
            total_size += version_string.len();
        }

        total_size += self.initial_descriptor.total_bytes();

        if let Some(ref descriptors) = self.additional_descriptors {
            for descriptor in descriptors {
                total_size += descriptor.total_bytes();
            }
        }

        if let Some(ref package_data) = self.firmware_device_package_data {
            total_size += package_data.len();
        }

        if let Some(ref manifest_data) = self.reference_manifest_data {
            total_size += manifest_data.len();
        }

        total_size
    }

    fn verify(&self, component_count: usize) -> Result<(), String> {
        if let Some(components) = &self.applicable_components {
            for &comp_index in components {
                if comp_index as usize >= component_count {
                    return Err(format!("invalid applicable component index {}", comp_index));
                }
            }
        }
        if let Some(ref version_string) = self.component_image_set_version_string {
            if version_string.len() > 255 {
                return Err(format!(
                    "component image set version string length exceeds 255: {}",
                    version_string.len()
                ));
            }
        }

        Ok(())
    }
}

impl Descriptor {
    pub fn encode(&self, buffer: &mut Vec<u8>) -> Result<(), ParseError> {
        buffer.write_all(&(self.descriptor_type.to_i32().unwrap_or(0) as u16).to_le_bytes())?;
        let descriptor_length = self.descriptor_data.len() as u16;
        buffer.write_all(&descriptor_length.to_le_bytes())?;
        buffer.write_all(&self.descriptor_data)?;
        Ok(())
    }

    fn decode(reader: &mut ByteReader) -> Result<Self, ParseError> {
        let descriptor_type =
            DescriptorType::from_u16(reader.u16_le()?).unwrap_or(DescriptorType::Unknown);
        let descriptor_length = reader.u16_le()?;
        let descriptor_data = reader.take(descriptor_length as usize)?.to_vec();

        Ok(Descriptor {
            descriptor_type,
            descriptor_data,
        })
    }

    pub fn total_bytes(&self) -> usize {
        2 + 2 + self.descriptor_data.len()
    }
}

impl DownstreamDeviceIdRecord {
    pub fn encode(&self, buffer: &mut Vec<u8>, component_bitmap_length: u16) -> Result<(), ParseError> {
        let record_length = self.total_bytes(component_bitmap_length) as u16;
        buffer.write_all(&record_length.to_le_bytes())?;
        buffer.push(self.record_descriptors.len() as u8);
        buffer.write_all(&self.update_option_flags.to_le_bytes())?;
        buffer.push(
            self.self_contained_activation_min_version_string_type
                .to_u8()
                .unwrap_or(0),
        );

        let version_string_length = self
            .self_contained_activation_min_version_string
            .as_ref()
            .map(|s| s.len() as u8)
            .unwrap_or(0);
        buffer.push(version_string_length);

        if let Some(package_data_ref) = &self.package_data {
            buffer.write_all(&(package_data_ref.len() as u16).to_le_bytes())?;
        } else {
            buffer.write_all(&0u16.to_le_bytes())?;
        }

        if let Some(reference_data_ref) = &self.reference_manifest_data {
            buffer.write_all(&(reference_data_ref.len() as u32).to_le_bytes())?;
        } else {
            buffer.write_all(&0u32.to_le_bytes())?;
        }

        buffer.write_all(&encode_applicable_components(
            &self.applicable_components,
            component_bitmap_length,
        ))?;

        if let Some(version_string) = &self.self_contained_activation_min_version_string {
            buffer.write_all(version_string.as_bytes())?;
        }

        if let Some(comparison_stamp) = self.self_contained_activation_min_version_comparison_stamp
        {
            buffer.write_all(&comparison_stamp.to_le_bytes())?;
        }

        for descriptor in &self.record_descriptors {
            descriptor.encode(buffer)?;
        }

        if let Some(package_data) = &self.package_data {
            buffer.write_all(package_data)?;
        }

        if let Some(manifest_data) = &self.reference_manifest_data {
            buffer.write_all(manifest_data)?;
        }

        Ok(())
    }

    fn decode(
        reader: &mut ByteReader,
        component_bitmap_length: u16,
        pldm_version: PldmVersion,
    ) -> Result<Self, ParseError> {
        let _record_length = reader.u16_le()?;
        let descriptor_count = reader.u8()?;
        let update_option_flags = reader.u32_le()?;
        let self_contained_activation_min_version_string_type =
            StringType::from_u8(reader.u8()?).unwrap_or(StringType::Unknown);
        let self_contained_activation_min_version_string_length = reader.u8()?;
        let package_data_length = reader.u16_le()?;

        let reference_manifest_length = if pldm_version == PldmVersion::Version13 {
            reader.u32_le()?
        } else {
            0
        };

        let bitmap = reader.take(component_bitmap_length.div_ceil(8) as usize)?;
        let applicable_components = decode_applicable_components(bitmap, component_bitmap_length);

        let self_contained_activation_min_version_string =
            if self_contained_activation_min_version_string_length > 0 {
                let bytes =
                    reader.take(self_contained_activation_min_version_string_length as usize)?;
                Some(
                    String::from_utf8(bytes.to_vec())
                        .map_err(|_| ParseError::InvalidVersionString)?,
                )
            } else {
                None
            };

        let self_contained_activation_min_version_comparison_stamp =
            if (update_option_flags & 0x00000001) != 0 {
                Some(reader.u32_le()?)
            } else {
                None
            };

        let mut record_descriptors = Vec::with_capacity(descriptor_count as usize);
        for _ in 0..descriptor_count {
            record_descriptors.push(Descriptor::decode(reader)?);
        }

        let package_data = if package_data_length > 0 {
            Some(reader.take(package_data_length as usize)?.to_vec())
        } else {
            None
        };

        let reference_manifest_data =
            if reference_manifest_length > 0 && pldm_version == PldmVersion::Version13 {
                Some(reader.take(reference_manifest_length as usize)?.to_vec())
            } else {
                None
            };

        Ok(DownstreamDeviceIdRecord {
            update_option_flags,
            self_contained_activation_min_version_string_type,
            applicable_components,
            self_contained_activation_min_version_string,
            self_contained_activation_min_version_comparison_stamp,
            record_descriptors,
            package_data,
            reference_manifest_data,
        })
    }

    pub fn total_bytes(&self, component_bitmap_length: u16) -> usize {
        let mut total_size = 0;
        total_size += 2; // record_length
        total_size += 1; // descriptor_count
        total_size += 4; // update_option_flags
        total_size += 1; // self_contained_activation_min_version_string_type
        total_size += 1; // self_contained_activation_min_version_string_length
        total_size += 2; // package_data_length
        total_size += 4; // reference_manifest_length
        total_size += component_bitmap_length.div_ceil(8) as usize;

        if let Some(ref version_string) = self.self_contained_activation_min_version_string {
            total_size += version_string.len();
        }

        total_size += 4; // self_contained_activation_min_version_comparison_stamp

        for descriptor in &self.record_descriptors {
            total_size += descriptor.total_bytes();
        }

        if let Some(ref package_data) = self.package_data {
            total_size += package_data.len();
        }

        if let Some(ref manifest_data) = self.reference_manifest_data {
            total_size += manifest_data.len();
        }

        total_size
    }

    fn verify(&self, component_count: usize) -> Result<(), String> {
        if let Some(components) = &self.applicable_components {
            for &comp_index in components {
                if comp_index as usize >= component_count {
                    return Err(format!("invalid applicable component index {}", comp_index));
                }
            }
        }
        if let Some(ref version_string) = self.self_contained_activation_min_version_string {
            if version_string.len() > 255 {
                return Err(format!(
                    "self contained activation min version string length exceeds 255: {}",
                    version_string.len()
                ));
            }
        }
        Ok(())
    }
}

impl ComponentImageInformation {
    /// Encodes the component's header entry. `image_size` is supplied by the
    /// caller (from already-loaded `image_data`) rather than read from disk.
    pub fn encode(&self, writer: &mut Vec<u8>, offset: u32, image_size: u32) -> Result<u32, ParseError> {
        writer.write_all(&self.classification.to_le_bytes())?;
        writer.write_all(&self.identifier.to_le_bytes())?;

        if (self.options & 0x0001) != 0 {
            writer.write_all(&self.comparison_stamp.unwrap_or(0u32).to_le_bytes())?;
        } else {
            writer.write_all(&0xFFFFFFFFu32.to_le_bytes())?;
        }

        writer.write_all(&self.options.to_le_bytes())?;
        writer.write_all(&self.requested_activation_method.to_le_bytes())?;
        writer.write_all(&offset.to_le_bytes())?;
        writer.write_all(&image_size.to_le_bytes())?;

        writer.push(self.version_string_type.to_u8().unwrap_or(0));
        let version_string_length = self
            .version_string
            .as_ref()
            .map(|s| s.len() as u8)
            .unwrap_or(0);
        writer.push(version_string_length);

        if let Some(version_string) = &self.version_string {
            writer.write_all(version_string.as_bytes())?;
        }

        let opaque_data_length = self
            .opaque_data
            .as_ref()
            .map(|d| d.len() as u32)
            .unwrap_or(0);
        writer.write_all(&opaque_data_length.to_le_bytes())?;

        if let Some(opaque_data) = &self.opaque_data {
            writer.write_all(opaque_data)?;
        }

        Ok(image_size)
    }

    fn decode(reader: &mut ByteReader, pldm_version: PldmVersion) -> Result<Self, ParseError> {
        let classification = reader.u16_le()?;
        let identifier = reader.u16_le()?;
        let comparison_stamp = Some(reader.u32_le()?);
        let options = reader.u16_le()?;
        let requested_activation_method = reader.u16_le()?;
        let offset = reader.u32_le()?;
        let size = reader.u32_le()?;

        let version_string_type =
            StringType::from_u8(reader.u8()?).unwrap_or(StringType::Unknown);
        let version_string_length = reader.u8()? as usize;
        let version_string = if version_string_length > 0 {
            let bytes = reader.take(version_string_length)?;
            Some(
                String::from_utf8(bytes.to_vec())
                    .map_err(|_| ParseError::InvalidVersionString)?,
            )
        } else {
            None
        };

        let opaque_data = if matches!(
            pldm_version,
            PldmVersion::Version13 | PldmVersion::Version12
        ) {
            let opaque_data_length = reader.u32_le()?;
            if opaque_data_length > 0 {
                Some(reader.take(opaque_data_length as usize)?.to_vec())
            } else {
                None
            }
        } else {
            None
        };

        Ok(ComponentImageInformation {
            image_location: None,
            classification,
            identifier,
            comparison_stamp,
            options,
            requested_activation_method,
            version_string_type,
            version_string,
            opaque_data,
            offset,
            size,
            image_data: None,
        })
    }

    pub fn total_bytes(&self) -> usize {
        let mut total_size = 0;
        total_size += 2; // classification
        total_size += 2; // identifier
        total_size += 4; // comparison_stamp
        total_size += 2; // options
        total_size += 2; // requested_activation_method
        total_size += 4; // location_offset
        total_size += 4; // size
        total_size += 1; // version_string_type
        total_size += 1; // version_string_length

        if let Some(ref version_string) = self.version_string {
            total_size += version_string.len();
        }

        total_size += 4; // opaque_data_length

        if let Some(ref opaque_data) = self.opaque_data {
            total_size += opaque_data.len();
        }

        total_size
    }

    fn verify(&self) -> Result<(), String> {
        if self.image_location.is_none() && self.image_data.is_none() {
            return Err("component image location or image data must be provided".to_string());
        }
        if let Some(ref version_string) = self.version_string {
            if version_string.len() > 255 {
                return Err(format!(
                    "component version string length exceeds 255: {}",
                    version_string.len()
                ));
            }
        }

        Ok(())
    }
}
