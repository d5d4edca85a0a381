//! 常量池
//!
//! 保留原始条目以便逐字节回写；追加常量时复用已有的相同条目。

use crate::reader::{ByteReader, WriteBigEndian};
use infrastructure_common::{IntrospectionError, IntrospectionResult, PatchError, PatchResult};

/// 常量池条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    /// 修订版 UTF-8 原始字节
    Utf8(Vec<u8>),
    Integer(u32),
    Float(u32),
    Long(u64),
    Double(u64),
    Class { name: u16 },
    String { value: u16 },
    FieldRef { class: u16, name_and_type: u16 },
    MethodRef { class: u16, name_and_type: u16 },
    InterfaceMethodRef { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
    MethodHandle { kind: u8, reference: u16 },
    MethodType { descriptor: u16 },
    Dynamic { bootstrap: u16, name_and_type: u16 },
    InvokeDynamic { bootstrap: u16, name_and_type: u16 },
    Module { name: u16 },
    Package { name: u16 },
    /// 索引 0 以及 long/double 占用的第二个槽位
    Unusable,
}

impl Constant {
    fn tag(&self) -> Option<u8> {
        let tag = match self {
            Constant::Utf8(_) => 1,
            Constant::Integer(_) => 3,
            Constant::Float(_) => 4,
            Constant::Long(_) => 5,
            Constant::Double(_) => 6,
            Constant::Class { .. } => 7,
            Constant::String { .. } => 8,
            Constant::FieldRef { .. } => 9,
            Constant::MethodRef { .. } => 10,
            Constant::InterfaceMethodRef { .. } => 11,
            Constant::NameAndType { .. } => 12,
            Constant::MethodHandle { .. } => 15,
            Constant::MethodType { .. } => 16,
            Constant::Dynamic { .. } => 17,
            Constant::InvokeDynamic { .. } => 18,
            Constant::Module { .. } => 19,
            Constant::Package { .. } => 20,
            Constant::Unusable => return None,
        };
        Some(tag)
    }

    /// 占用的槽位数
    fn slots(&self) -> usize {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }

    fn read(tag: u8, index: u16, reader: &mut ByteReader<'_>) -> IntrospectionResult<Self> {
        let constant = match tag {
            1 => {
                let len = reader.u16()? as usize;
                Constant::Utf8(reader.bytes(len)?.to_vec())
            }
            3 => Constant::Integer(reader.u32()?),
            4 => Constant::Float(reader.u32()?),
            5 => Constant::Long(reader.u64()?),
            6 => Constant::Double(reader.u64()?),
            7 => Constant::Class { name: reader.u16()? },
            8 => Constant::String { value: reader.u16()? },
            9 => Constant::FieldRef {
                class: reader.u16()?,
                name_and_type: reader.u16()?,
            },
            10 => Constant::MethodRef {
                class: reader.u16()?,
                name_and_type: reader.u16()?,
            },
            11 => Constant::InterfaceMethodRef {
                class: reader.u16()?,
                name_and_type: reader.u16()?,
            },
            12 => Constant::NameAndType {
                name: reader.u16()?,
                descriptor: reader.u16()?,
            },
            15 => Constant::MethodHandle {
                kind: reader.u8()?,
                reference: reader.u16()?,
            },
            16 => Constant::MethodType {
                descriptor: reader.u16()?,
            },
            17 => Constant::Dynamic {
                bootstrap: reader.u16()?,
                name_and_type: reader.u16()?,
            },
            18 => Constant::InvokeDynamic {
                bootstrap: reader.u16()?,
                name_and_type: reader.u16()?,
            },
            19 => Constant::Module { name: reader.u16()? },
            20 => Constant::Package { name: reader.u16()? },
            _ => return Err(IntrospectionError::UnsupportedConstantTag { tag, index }),
        };
        Ok(constant)
    }

    fn write(&self, out: &mut Vec<u8>) {
        let Some(tag) = self.tag() else {
            return;
        };
        out.put_u8(tag);
        match self {
            Constant::Utf8(bytes) => {
                out.put_u16(bytes.len() as u16);
                out.extend_from_slice(bytes);
            }
            Constant::Integer(value) | Constant::Float(value) => out.put_u32(*value),
            Constant::Long(value) | Constant::Double(value) => {
                out.extend_from_slice(&value.to_be_bytes())
            }
            Constant::Class { name }
            | Constant::Module { name }
            | Constant::Package { name } => out.put_u16(*name),
            Constant::String { value } => out.put_u16(*value),
            Constant::MethodType { descriptor } => out.put_u16(*descriptor),
            Constant::FieldRef {
                class,
                name_and_type,
            }
            | Constant::MethodRef {
                class,
                name_and_type,
            }
            | Constant::InterfaceMethodRef {
                class,
                name_and_type,
            } => {
                out.put_u16(*class);
                out.put_u16(*name_and_type);
            }
            Constant::NameAndType { name, descriptor } => {
                out.put_u16(*name);
                out.put_u16(*descriptor);
            }
            Constant::MethodHandle { kind, reference } => {
                out.put_u8(*kind);
                out.put_u16(*reference);
            }
            Constant::Dynamic {
                bootstrap,
                name_and_type,
            }
            | Constant::InvokeDynamic {
                bootstrap,
                name_and_type,
            } => {
                out.put_u16(*bootstrap);
                out.put_u16(*name_and_type);
            }
            Constant::Unusable => {}
        }
    }
}

/// 常量池
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantPool {
    entries: Vec<Constant>,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantPool {
    /// 创建空常量池（仅含索引 0）
    pub fn new() -> Self {
        Self {
            entries: vec![Constant::Unusable],
        }
    }

    /// 读取常量池
    pub fn parse(reader: &mut ByteReader<'_>) -> IntrospectionResult<Self> {
        let count = reader.u16()?;
        let mut entries = Vec::with_capacity(count as usize);
        entries.push(Constant::Unusable);

        let mut index = 1u16;
        while index < count {
            let tag = reader.u8()?;
            let constant = Constant::read(tag, index, reader)?;
            let slots = constant.slots();
            if index as usize + slots > count as usize {
                return Err(IntrospectionError::InvalidConstantIndex { index });
            }
            entries.push(constant);
            if slots == 2 {
                entries.push(Constant::Unusable);
            }
            index += slots as u16;
        }

        Ok(Self { entries })
    }

    /// 写出常量池（含计数）
    pub fn write(&self, out: &mut Vec<u8>) {
        out.put_u16(self.entries.len() as u16);
        for constant in &self.entries {
            constant.write(out);
        }
    }

    /// constant_pool_count 的值
    pub fn count(&self) -> u16 {
        self.entries.len() as u16
    }

    /// 按索引获取条目
    pub fn get(&self, index: u16) -> IntrospectionResult<&Constant> {
        match self.entries.get(index as usize) {
            Some(Constant::Unusable) | None => {
                Err(IntrospectionError::InvalidConstantIndex { index })
            }
            Some(constant) => Ok(constant),
        }
    }

    /// 读取 Utf8 常量
    pub fn utf8(&self, index: u16) -> IntrospectionResult<String> {
        match self.get(index)? {
            Constant::Utf8(bytes) => {
                decode_modified_utf8(bytes).ok_or(IntrospectionError::InvalidUtf8 { index })
            }
            _ => Err(mismatch(index, "Utf8")),
        }
    }

    /// 读取 Class 常量的内部名
    pub fn class_name(&self, index: u16) -> IntrospectionResult<String> {
        match self.get(index)? {
            Constant::Class { name } => self.utf8(*name),
            _ => Err(mismatch(index, "Class")),
        }
    }

    /// 读取 Integer 常量
    pub fn integer(&self, index: u16) -> IntrospectionResult<i32> {
        match self.get(index)? {
            Constant::Integer(value) => Ok(*value as i32),
            _ => Err(mismatch(index, "Integer")),
        }
    }

    /// 读取 Long 常量
    pub fn long(&self, index: u16) -> IntrospectionResult<i64> {
        match self.get(index)? {
            Constant::Long(value) => Ok(*value as i64),
            _ => Err(mismatch(index, "Long")),
        }
    }

    /// 读取 Float 常量
    pub fn float(&self, index: u16) -> IntrospectionResult<f32> {
        match self.get(index)? {
            Constant::Float(bits) => Ok(f32::from_bits(*bits)),
            _ => Err(mismatch(index, "Float")),
        }
    }

    /// 读取 Double 常量
    pub fn double(&self, index: u16) -> IntrospectionResult<f64> {
        match self.get(index)? {
            Constant::Double(bits) => Ok(f64::from_bits(*bits)),
            _ => Err(mismatch(index, "Double")),
        }
    }

    /// 解析方法或字段引用，返回（类内部名，名称，描述符）
    pub fn member_ref(&self, index: u16) -> IntrospectionResult<(String, String, String)> {
        let (class, name_and_type) = match self.get(index)? {
            Constant::FieldRef {
                class,
                name_and_type,
            }
            | Constant::MethodRef {
                class,
                name_and_type,
            }
            | Constant::InterfaceMethodRef {
                class,
                name_and_type,
            } => (*class, *name_and_type),
            _ => return Err(mismatch(index, "MemberRef")),
        };
        let (name, descriptor) = match self.get(name_and_type)? {
            Constant::NameAndType { name, descriptor } => (*name, *descriptor),
            _ => return Err(mismatch(name_and_type, "NameAndType")),
        };
        Ok((
            self.class_name(class)?,
            self.utf8(name)?,
            self.utf8(descriptor)?,
        ))
    }

    /// 追加常量，已存在相同条目时返回其索引
    pub fn add(&mut self, constant: Constant) -> PatchResult<u16> {
        if constant != Constant::Unusable {
            if let Some(index) = self.entries.iter().position(|c| *c == constant) {
                return Ok(index as u16);
            }
        }

        let slots = constant.slots();
        if self.entries.len() + slots > u16::MAX as usize {
            return Err(PatchError::ConstantPoolOverflow);
        }
        let index = self.entries.len() as u16;
        self.entries.push(constant);
        if slots == 2 {
            self.entries.push(Constant::Unusable);
        }
        Ok(index)
    }

    pub fn add_utf8(&mut self, value: &str) -> PatchResult<u16> {
        self.add(Constant::Utf8(encode_modified_utf8(value)))
    }

    /// 追加 Class 常量，参数为内部名
    pub fn add_class(&mut self, internal_name: &str) -> PatchResult<u16> {
        let name = self.add_utf8(internal_name)?;
        self.add(Constant::Class { name })
    }

    pub fn add_name_and_type(&mut self, name: &str, descriptor: &str) -> PatchResult<u16> {
        let name = self.add_utf8(name)?;
        let descriptor = self.add_utf8(descriptor)?;
        self.add(Constant::NameAndType { name, descriptor })
    }

    /// 追加方法引用，类参数为内部名
    pub fn add_method_ref(
        &mut self,
        class_internal_name: &str,
        name: &str,
        descriptor: &str,
    ) -> PatchResult<u16> {
        let class = self.add_class(class_internal_name)?;
        let name_and_type = self.add_name_and_type(name, descriptor)?;
        self.add(Constant::MethodRef {
            class,
            name_and_type,
        })
    }

    pub fn add_integer(&mut self, value: i32) -> PatchResult<u16> {
        self.add(Constant::Integer(value as u32))
    }

    pub fn add_long(&mut self, value: i64) -> PatchResult<u16> {
        self.add(Constant::Long(value as u64))
    }

    pub fn add_double(&mut self, value: f64) -> PatchResult<u16> {
        self.add(Constant::Double(value.to_bits()))
    }
}

fn mismatch(index: u16, expected: &'static str) -> IntrospectionError {
    IntrospectionError::ConstantTypeMismatch { index, expected }
}

/// 解码修订版 UTF-8（`0xC0 0x80` 表示 NUL，增补字符以代理对编码）
pub fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Some(text.to_string());
    }

    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b & 0x80 == 0 {
            units.push(u16::from(b));
            i += 1;
        } else if b & 0xE0 == 0xC0 {
            let b2 = continuation(bytes.get(i + 1))?;
            units.push((u16::from(b & 0x1F) << 6) | b2);
            i += 2;
        } else if b & 0xF0 == 0xE0 {
            let b2 = continuation(bytes.get(i + 1))?;
            let b3 = continuation(bytes.get(i + 2))?;
            units.push((u16::from(b & 0x0F) << 12) | (b2 << 6) | b3);
            i += 3;
        } else {
            return None;
        }
    }
    String::from_utf16(&units).ok()
}

fn continuation(byte: Option<&u8>) -> Option<u16> {
    let byte = *byte?;
    (byte & 0xC0 == 0x80).then_some(u16::from(byte & 0x3F))
}

/// 编码为修订版 UTF-8
pub fn encode_modified_utf8(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}
