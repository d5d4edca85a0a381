//! 大端字节读写工具

use infrastructure_common::{IntrospectionError, IntrospectionResult};

/// 大端字节读取器
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    /// 从切片创建读取器
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// 当前偏移
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// 剩余字节数
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// 读取指定长度的字节
    pub fn bytes(&mut self, len: usize) -> IntrospectionResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(IntrospectionError::Truncated {
                offset: self.offset,
                needed: len,
            });
        }
        let slice = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    pub fn u8(&mut self) -> IntrospectionResult<u8> {
        Ok(self.bytes(1)?[0])
    }

    pub fn u16(&mut self) -> IntrospectionResult<u16> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> IntrospectionResult<u32> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn u64(&mut self) -> IntrospectionResult<u64> {
        let high = u64::from(self.u32()?);
        let low = u64::from(self.u32()?);
        Ok((high << 32) | low)
    }

    /// 确认数据已全部读取
    pub fn finish(&self) -> IntrospectionResult<()> {
        match self.remaining() {
            0 => Ok(()),
            remaining => Err(IntrospectionError::TrailingBytes { remaining }),
        }
    }
}

/// 大端写入扩展
pub trait WriteBigEndian {
    fn put_u8(&mut self, value: u8);
    fn put_u16(&mut self, value: u16);
    fn put_u32(&mut self, value: u32);
}

impl WriteBigEndian for Vec<u8> {
    fn put_u8(&mut self, value: u8) {
        self.push(value);
    }

    fn put_u16(&mut self, value: u16) {
        self.extend_from_slice(&value.to_be_bytes());
    }

    fn put_u32(&mut self, value: u32) {
        self.extend_from_slice(&value.to_be_bytes());
    }
}
