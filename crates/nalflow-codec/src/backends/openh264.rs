//! 基于 `openh264` crate 的图像解码引擎.
//!
//! OpenH264 接收 Annex B 码流, 因此配置时先送入 SPS/PPS,
//! 每帧再把 NAL 负载重新加上起始码. 输出的 I420 按会话要求的像素格式转换.

use log::debug;
use nalflow_core::PixelFormat;
use openh264::OpenH264API;
use openh264::decoder::Decoder;
use openh264::formats::YUVSource;

use super::software::PictureDecoder;
use crate::error::BackendStatus;
use crate::frame::PixelBuffer;
use crate::parsers::h264::{H264FormatDescriptor, START_CODE};

/// OpenH264 图像解码引擎
pub struct OpenH264PictureDecoder {
    decoder: Decoder,
}

impl OpenH264PictureDecoder {
    pub fn new() -> Result<Self, BackendStatus> {
        let api = OpenH264API::from_source();
        let decoder = Decoder::new(api).map_err(|err| {
            debug!("openh264 解码器创建失败: {:?}", err);
            BackendStatus::DECODER_FAILURE
        })?;
        Ok(Self { decoder })
    }
}

impl PictureDecoder for OpenH264PictureDecoder {
    fn name(&self) -> &str {
        "openh264"
    }

    fn configure(&mut self, descriptor: &H264FormatDescriptor) -> Result<(), BackendStatus> {
        // 参数集本身不产生图像
        self.decoder
            .decode(&descriptor.annex_b_parameter_sets())
            .map(|_| ())
            .map_err(|err| {
                debug!("openh264 拒绝参数集: {:?}", err);
                BackendStatus::INVALID_PARAMETER_SET
            })
    }

    fn decode(
        &mut self,
        nal: &[u8],
        output_format: PixelFormat,
    ) -> Result<Option<PixelBuffer>, BackendStatus> {
        let mut annex_b = Vec::with_capacity(nal.len() + START_CODE.len());
        annex_b.extend_from_slice(&START_CODE);
        annex_b.extend_from_slice(nal);

        match self.decoder.decode(&annex_b) {
            Ok(Some(yuv)) => {
                let (width, height) = yuv.dimension_rgb();
                if width == 0 || height == 0 {
                    return Ok(None);
                }
                let chroma_height = height.div_ceil(2);
                let strides = (
                    yuv.y().len() / height,
                    yuv.u().len() / chroma_height,
                    yuv.v().len() / chroma_height,
                );
                PixelBuffer::from_i420(
                    (yuv.y(), yuv.u(), yuv.v()),
                    strides,
                    width as u32,
                    height as u32,
                    output_format,
                )
                .map(Some)
                .map_err(|err| {
                    debug!("openh264 输出转换失败: {}", err);
                    BackendStatus::UNSUPPORTED_FORMAT
                })
            }
            Ok(None) => Ok(None),
            Err(err) => {
                debug!("openh264 解码失败: {:?}", err);
                Err(BackendStatus::DECODER_FAILURE)
            }
        }
    }
}
