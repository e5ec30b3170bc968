// Copyright (C) 2024 gigablaster

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use std::{
    fs::File,
    io::{self},
    path::Path,
};

use ash::vk;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use onyx_backend::Device;
use uuid::Uuid;

use crate::Result;

const MAGICK: [u8; 4] = *b"OXPC";
const VERSION: u32 = 1;

#[derive(Debug, PartialEq, Eq)]
struct Header {
    pub magic: [u8; 4],
    pub version: u32,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            magic: MAGICK,
            version: VERSION,
        }
    }
}

impl Header {
    pub fn write<W: io::Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.magic)?;
        w.write_u32::<LittleEndian>(self.version)?;

        Ok(())
    }

    pub fn read<R: io::Read>(r: &mut R) -> io::Result<Self> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        Ok(Self {
            magic,
            version: r.read_u32::<LittleEndian>()?,
        })
    }

    pub fn validate(&self) -> bool {
        self.magic == MAGICK && self.version >= VERSION
    }
}

/// Driver pipeline-cache blob, stamped with the device identity so a
/// blob from another GPU or driver version is rejected.
#[derive(Debug)]
struct PipelineDiskCache {
    vendor_id: u32,
    device_id: u32,
    driver_version: u32,
    uuid: Uuid,
    data: Vec<u8>,
}

impl PipelineDiskCache {
    pub fn new(device: &Device, data: &[u8]) -> Self {
        let properties = device.physical_device().properties();

        Self {
            vendor_id: properties.vendor_id,
            device_id: properties.device_id,
            driver_version: properties.driver_version,
            uuid: Uuid::from_bytes(properties.pipeline_cache_uuid),
            data: data.to_vec(),
        }
    }

    pub fn matches(&self, device: &Device) -> bool {
        let properties = device.physical_device().properties();
        self.vendor_id == properties.vendor_id
            && self.device_id == properties.device_id
            && self.driver_version == properties.driver_version
            && self.uuid == Uuid::from_bytes(properties.pipeline_cache_uuid)
    }

    pub fn read<R: io::Read>(mut r: R) -> io::Result<Self> {
        if !Header::read(&mut r)?.validate() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Wrong pipeline cache header",
            ));
        }
        Ok(Self {
            vendor_id: r.read_u32::<LittleEndian>()?,
            device_id: r.read_u32::<LittleEndian>()?,
            driver_version: r.read_u32::<LittleEndian>()?,
            uuid: Uuid::from_u128(r.read_u128::<LittleEndian>()?),
            data: Self::read_data(&mut r)?,
        })
    }

    fn read_data<R: io::Read>(r: &mut R) -> io::Result<Vec<u8>> {
        let size = r.read_u32::<LittleEndian>()?;
        let mut bytes = vec![0u8; size as usize];
        r.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    pub fn save<W: io::Write>(&self, mut w: W) -> io::Result<()> {
        Header::default().write(&mut w)?;
        w.write_u32::<LittleEndian>(self.vendor_id)?;
        w.write_u32::<LittleEndian>(self.device_id)?;
        w.write_u32::<LittleEndian>(self.driver_version)?;
        w.write_u128::<LittleEndian>(self.uuid.as_u128())?;
        w.write_u32::<LittleEndian>(self.data.len() as _)?;
        w.write_all(&self.data)?;
        Ok(())
    }
}

pub(crate) fn load_or_create_pipeline_cache<P: AsRef<Path>>(
    device: &Device,
    path: P,
) -> Result<vk::PipelineCache> {
    let data = File::open(path)
        .ok()
        .and_then(|file| PipelineDiskCache::read(file).ok())
        .filter(|cache| cache.matches(device))
        .map(|cache| cache.data);

    let create_info = if let Some(data) = &data {
        vk::PipelineCacheCreateInfo::builder().initial_data(data)
    } else {
        vk::PipelineCacheCreateInfo::builder()
    }
    .build();

    let cache = match unsafe { device.get().create_pipeline_cache(&create_info, None) } {
        Ok(cache) => cache,
        Err(_) => {
            // Stale blob the driver rejected, start over empty.
            let create_info = vk::PipelineCacheCreateInfo::builder().build();
            unsafe { device.get().create_pipeline_cache(&create_info, None) }
                .map_err(onyx_backend::Error::from)?
        }
    };

    Ok(cache)
}

pub(crate) fn save_pipeline_cache<P: AsRef<Path>>(
    device: &Device,
    cache: vk::PipelineCache,
    path: P,
) -> io::Result<()> {
    let data = unsafe { device.get().get_pipeline_cache_data(cache) }.map_err(|err| {
        io::Error::new(
            io::ErrorKind::Other,
            format!("Failed to get pipeline cache data from device: {:?}", err),
        )
    })?;
    PipelineDiskCache::new(device, &data).save(File::create(path)?)
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use uuid::Uuid;

    use super::{Header, PipelineDiskCache};

    #[test]
    fn header_round_trip() {
        let mut bytes = Vec::new();
        Header::default().write(&mut bytes).unwrap();
        let header = Header::read(&mut Cursor::new(&bytes)).unwrap();
        assert!(header.validate());
    }

    #[test]
    fn wrong_magic_rejected() {
        let header = Header {
            magic: *b"NOPE",
            version: 1,
        };
        assert!(!header.validate());
    }

    #[test]
    fn cache_round_trip() {
        let cache = PipelineDiskCache {
            vendor_id: 0x10de,
            device_id: 0x2206,
            driver_version: 42,
            uuid: Uuid::from_u128(7),
            data: vec![1, 2, 3, 4, 5],
        };
        let mut bytes = Vec::new();
        cache.save(&mut bytes).unwrap();
        let loaded = PipelineDiskCache::read(Cursor::new(&bytes)).unwrap();
        assert_eq!(cache.vendor_id, loaded.vendor_id);
        assert_eq!(cache.device_id, loaded.device_id);
        assert_eq!(cache.driver_version, loaded.driver_version);
        assert_eq!(cache.uuid, loaded.uuid);
        assert_eq!(cache.data, loaded.data);
    }
}
