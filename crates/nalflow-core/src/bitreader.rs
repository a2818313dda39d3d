//! 比特流读取器.
//!
//! 按大端位序 (MSB first) 读取去除防竞争字节后的 RBSP,
//! 供 SPS 等参数集解析使用, 含 Exp-Golomb 解码.

use crate::{NalflowError, NalflowResult};

/// Exp-Golomb 码允许的最大前导零个数 (ue(v) 取值不超过 u32)
const MAX_LEADING_ZEROS: u32 = 31;

/// 比特流读取器
///
/// # 示例
/// ```
/// use nalflow_core::bitreader::BitReader;
///
/// // 1 | 010 | 011 | 00100
/// let data = [0b1010_0110, 0b0100_0000];
/// let mut br = BitReader::new(&data);
/// assert!(br.read_flag().unwrap());
/// assert_eq!(br.read_ue().unwrap(), 1);
/// assert_eq!(br.read_se().unwrap(), -1);
/// assert_eq!(br.read_ue().unwrap(), 3);
/// ```
pub struct BitReader<'a> {
    data: &'a [u8],
    /// 下一个待读位的位置
    pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn bits_read(&self) -> usize {
        self.pos
    }

    pub fn bits_left(&self) -> usize {
        self.data.len() * 8 - self.pos
    }

    fn ensure(&self, n: usize) -> NalflowResult<()> {
        if n > self.bits_left() {
            return Err(NalflowError::Eof);
        }
        Ok(())
    }

    /// 读取 1 个位
    pub fn read_bit(&mut self) -> NalflowResult<u32> {
        self.ensure(1)?;
        let byte = self.data[self.pos / 8];
        let bit = (byte >> (7 - self.pos % 8)) & 1;
        self.pos += 1;
        Ok(u32::from(bit))
    }

    /// 读取 1 位标志 (`u(1)`)
    pub fn read_flag(&mut self) -> NalflowResult<bool> {
        Ok(self.read_bit()? == 1)
    }

    /// 读取 N 个位 (最多 32 位), 返回值的低 N 位有效
    pub fn read_bits(&mut self, n: u32) -> NalflowResult<u32> {
        if n > 32 {
            return Err(NalflowError::InvalidArgument(format!(
                "read_bits: n={} 超过 32 位",
                n
            )));
        }
        self.ensure(n as usize)?;

        let mut value = 0u32;
        let mut remaining = n;
        while remaining > 0 {
            let offset = (self.pos % 8) as u32;
            let take = remaining.min(8 - offset);
            let byte = u32::from(self.data[self.pos / 8]);
            let bits = (byte >> (8 - offset - take)) & ((1 << take) - 1);
            value = (value << take) | bits;
            self.pos += take as usize;
            remaining -= take;
        }
        Ok(value)
    }

    /// 跳过 N 个位
    pub fn skip_bits(&mut self, n: u32) -> NalflowResult<()> {
        self.ensure(n as usize)?;
        self.pos += n as usize;
        Ok(())
    }

    /// 无符号 Exp-Golomb 编码值 `ue(v)`
    pub fn read_ue(&mut self) -> NalflowResult<u32> {
        let mut leading_zeros = 0u32;
        while !self.read_flag()? {
            leading_zeros += 1;
            if leading_zeros > MAX_LEADING_ZEROS {
                return Err(NalflowError::InvalidData(
                    "Exp-Golomb 前导零过多".into(),
                ));
            }
        }
        if leading_zeros == 0 {
            return Ok(0);
        }
        let suffix = self.read_bits(leading_zeros)?;
        Ok(((1u64 << leading_zeros) - 1 + u64::from(suffix)) as u32)
    }

    /// 有符号 Exp-Golomb 编码值 `se(v)`: 0, 1, -1, 2, -2, ...
    pub fn read_se(&mut self) -> NalflowResult<i32> {
        let code = self.read_ue()?;
        let magnitude = code.div_ceil(2) as i32;
        Ok(if code & 1 == 0 { -magnitude } else { magnitude })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_across_byte_boundary() {
        let data = [0b0000_0011, 0b1100_0000];
        let mut br = BitReader::new(&data);
        br.skip_bits(6).unwrap();
        assert_eq!(br.read_bits(4).unwrap(), 0b1111);
        assert_eq!(br.bits_read(), 10);
        assert_eq!(br.bits_left(), 6);
    }

    #[test]
    fn test_read_32_bits() {
        let data = [0xDE, 0xAD, 0xBE, 0xEF];
        let mut br = BitReader::new(&data);
        assert_eq!(br.read_bits(32).unwrap(), 0xDEAD_BEEF);
        assert!(matches!(br.read_bit(), Err(NalflowError::Eof)));
    }

    #[test]
    fn test_overrun_is_eof() {
        let data = [0xFF];
        let mut br = BitReader::new(&data);
        assert!(matches!(br.read_bits(9), Err(NalflowError::Eof)));
        assert!(matches!(br.skip_bits(9), Err(NalflowError::Eof)));
        assert!(matches!(br.read_bits(33), Err(NalflowError::InvalidArgument(_))));
        assert_eq!(br.read_bits(0).unwrap(), 0);
    }

    #[test]
    fn test_exp_golomb_ue() {
        for (data, expected) in [
            (0b1000_0000u8, 0u32),
            (0b0100_0000, 1),
            (0b0110_0000, 2),
            (0b0010_0000, 3),
            (0b0001_0000, 7),
        ] {
            let buf = [data];
            let mut br = BitReader::new(&buf);
            assert_eq!(br.read_ue().unwrap(), expected);
        }
    }

    #[test]
    fn test_exp_golomb_se() {
        for (data, expected) in [
            (0b1000_0000u8, 0i32),
            (0b0100_0000, 1),
            (0b0110_0000, -1),
            (0b0010_0000, 2),
            (0b0010_1000, -2),
        ] {
            let buf = [data];
            let mut br = BitReader::new(&buf);
            assert_eq!(br.read_se().unwrap(), expected);
        }
    }

    #[test]
    fn test_exp_golomb_rejects_runaway_prefix() {
        let data = [0u8; 5];
        let mut br = BitReader::new(&data);
        assert!(matches!(br.read_ue(), Err(NalflowError::InvalidData(_))));

        let truncated = [0b0000_0001];
        let mut br = BitReader::new(&truncated);
        assert!(matches!(br.read_ue(), Err(NalflowError::Eof)));
    }
}
