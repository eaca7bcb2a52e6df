//
// Copyright (c) Pirmin Kalberer. All rights reserved.
// Licensed under the MIT License. See LICENSE file in the project root for full license information.
//

//! GeoTIFF reading and writing without GDAL

use crate::core::error::{Error, Result};
use crate::raster::driver::RasterDriver;
use crate::raster::projection::is_geographic;
use crate::raster::raster::{GeoTransform, Raster};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

const GT_MODEL_TYPE_GEO_KEY: u16 = 1024;
const GT_RASTER_TYPE_GEO_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;

/// Band name of single band files without description
pub const DEFAULT_BAND: &str = "band_data";

#[derive(Default, Clone, Debug)]
pub struct GeoTiffDriver;

/// Decoded image with all samples interleaved
struct TiffImage {
    width: u32,
    height: u32,
    samples: usize,
    data: Vec<f32>,
    transform: GeoTransform,
    srid: i32,
    band_names: Vec<String>,
}

fn geotiff_tag(id: u16) -> Tag {
    Tag::from_u16_exhaustive(id)
}

fn into_f32(result: DecodingResult) -> Vec<f32> {
    match result {
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f32).collect(),
    }
}

/// EPSG code from a GeoKeyDirectory. Projected systems take precedence.
fn srid_from_geokeys(keys: &[u32]) -> Option<i32> {
    let entries: Vec<&[u32]> = keys.get(4..)?.chunks(4).filter(|e| e.len() == 4).collect();
    [PROJECTED_CS_TYPE_GEO_KEY, GEOGRAPHIC_TYPE_GEO_KEY]
        .iter()
        .filter_map(|key| {
            entries
                .iter()
                .find(|e| e[0] == *key as u32 && e[1] == 0)
                .map(|e| e[3] as i32)
        })
        .next()
}

fn geokey_directory(srid: i32) -> Vec<u16> {
    let geographic = is_geographic(srid);
    let mut keys: Vec<u16> = vec![
        GT_MODEL_TYPE_GEO_KEY,
        0,
        1,
        if geographic { 2 } else { 1 },
        GT_RASTER_TYPE_GEO_KEY,
        0,
        1,
        1, // PixelIsArea
    ];
    if srid > 0 && srid <= u16::MAX as i32 {
        let key = if geographic {
            GEOGRAPHIC_TYPE_GEO_KEY
        } else {
            PROJECTED_CS_TYPE_GEO_KEY
        };
        keys.extend_from_slice(&[key, 0, 1, srid as u16]);
    }
    let mut dir = vec![1, 1, 0, (keys.len() / 4) as u16];
    dir.extend(keys);
    dir
}

fn decode<R: Read + Seek>(reader: R) -> Result<TiffImage> {
    let mut decoder = Decoder::new(reader)?;
    let (width, height) = decoder.dimensions()?;

    let scale = decoder
        .find_tag(geotiff_tag(MODEL_PIXEL_SCALE))?
        .map(|v| v.into_f64_vec())
        .transpose()?;
    let tiepoint = decoder
        .find_tag(geotiff_tag(MODEL_TIEPOINT))?
        .map(|v| v.into_f64_vec())
        .transpose()?;
    let transform = match (scale, tiepoint) {
        (Some(scale), Some(tie)) if scale.len() >= 2 && tie.len() >= 6 => GeoTransform {
            origin_x: tie[3] - tie[0] * scale[0],
            origin_y: tie[4] + tie[1] * scale[1],
            pixel_width: scale[0],
            pixel_height: -scale[1],
        },
        _ => GeoTransform {
            origin_x: 0.0,
            origin_y: height as f64,
            pixel_width: 1.0,
            pixel_height: -1.0,
        },
    };
    let srid = decoder
        .find_tag(geotiff_tag(GEO_KEY_DIRECTORY))?
        .map(|v| v.into_u32_vec())
        .transpose()?
        .and_then(|keys| srid_from_geokeys(&keys))
        .unwrap_or(0);
    let nodata = decoder
        .find_tag(geotiff_tag(GDAL_NODATA))?
        .map(|v| v.into_string())
        .transpose()?
        .and_then(|s| s.trim_matches(char::from(0)).trim().parse::<f32>().ok());
    let description = decoder
        .find_tag(Tag::ImageDescription)?
        .map(|v| v.into_string())
        .transpose()?;

    let mut data = into_f32(decoder.read_image()?);
    let pixels = width as usize * height as usize;
    if pixels == 0 || data.len() % pixels != 0 {
        return Err(Error::Raster(format!(
            "Unexpected sample count {} for {}x{} image",
            data.len(),
            width,
            height
        )));
    }
    let samples = data.len() / pixels;
    if let Some(nodata) = nodata.filter(|v| !v.is_nan()) {
        for v in data.iter_mut().filter(|v| **v == nodata) {
            *v = f32::NAN;
        }
    }

    let described: Option<Vec<String>> = description
        .map(|d| {
            d.trim_matches(char::from(0))
                .split(',')
                .map(|s| s.trim().to_string())
                .collect::<Vec<_>>()
        })
        .filter(|names| names.len() == samples && names.iter().all(|n| !n.is_empty()));
    let band_names = described.unwrap_or_else(|| {
        if samples == 1 {
            vec![DEFAULT_BAND.to_string()]
        } else {
            (1..=samples).map(|i| format!("band_{}", i)).collect()
        }
    });

    Ok(TiffImage {
        width,
        height,
        samples,
        data,
        transform,
        srid,
        band_names,
    })
}

impl TiffImage {
    fn into_band(self, band: &str, path: &Path) -> Result<Raster> {
        let idx = self
            .band_names
            .iter()
            .position(|b| b == band)
            .ok_or_else(|| Error::UnknownBand {
                dataset: path.display().to_string(),
                band: band.to_string(),
            })?;
        let data = if self.samples == 1 {
            self.data
        } else {
            self.data
                .iter()
                .skip(idx)
                .step_by(self.samples)
                .cloned()
                .collect()
        };
        let mut raster = Raster::new(self.width, self.height, self.transform, self.srid, data)?;
        raster
            .attrs
            .insert("band".to_string(), band.to_string());
        Ok(raster)
    }
}

impl GeoTiffDriver {
    fn open(&self, path: &Path) -> Result<TiffImage> {
        debug!("Reading {}", path.display());
        let file = File::open(path)?;
        decode(BufReader::new(file))
    }
}

impl RasterDriver for GeoTiffDriver {
    fn extension(&self) -> &str {
        "tif"
    }
    fn band_names(&self, path: &Path) -> Result<Vec<String>> {
        Ok(self.open(path)?.band_names)
    }
    fn read_band(&self, path: &Path, band: &str) -> Result<Raster> {
        self.open(path)?.into_band(band, path)
    }
    fn encode(&self, raster: &Raster, band: &str) -> Result<Vec<u8>> {
        if raster.is_empty() {
            return Err(Error::Raster("Cannot encode empty raster".to_string()));
        }
        let raster = raster.north_up();
        let mut buf = Cursor::new(Vec::new());
        {
            let mut encoder = TiffEncoder::new(&mut buf)?;
            let mut image = encoder.new_image::<Gray32Float>(raster.width, raster.height)?;
            let dir = image.encoder();
            dir.write_tag(Tag::ImageDescription, band)?;
            let scale = [
                raster.transform.pixel_width,
                -raster.transform.pixel_height,
                0.0,
            ];
            dir.write_tag(geotiff_tag(MODEL_PIXEL_SCALE), &scale[..])?;
            let tiepoint = [
                0.0,
                0.0,
                0.0,
                raster.transform.origin_x,
                raster.transform.origin_y,
                0.0,
            ];
            dir.write_tag(geotiff_tag(MODEL_TIEPOINT), &tiepoint[..])?;
            dir.write_tag(
                geotiff_tag(GEO_KEY_DIRECTORY),
                &geokey_directory(raster.srid)[..],
            )?;
            dir.write_tag(geotiff_tag(GDAL_NODATA), "nan")?;
            image.write_data(&raster.data)?;
        }
        Ok(buf.into_inner())
    }
}

/// Read a single band from GeoTIFF bytes
pub fn decode_band(bytes: &[u8], band: &str) -> Result<Raster> {
    decode(Cursor::new(bytes))?.into_band(band, Path::new("<memory>"))
}
