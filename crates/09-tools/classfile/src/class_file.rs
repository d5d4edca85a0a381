//! 类文件结构
//!
//! 完整读取类文件的各个部分，未识别的属性以原始字节保留，
//! 因此 `parse` 之后的 `to_bytes` 与输入逐字节一致。

use crate::constant_pool::ConstantPool;
use crate::reader::{ByteReader, WriteBigEndian};
use infrastructure_common::{
    internal_to_qualified, IntrospectionError, IntrospectionResult, TypeKind,
};

/// 类文件魔数
pub const MAGIC: u32 = 0xCAFE_BABE;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_SUPER: u16 = 0x0020;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_ANNOTATION: u16 = 0x2000;
pub const ACC_ENUM: u16 = 0x4000;

/// 静态初始化方法名
pub const CLINIT: &str = "<clinit>";

/// 属性
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInfo {
    /// 属性名（Utf8 常量索引）
    pub name_index: u16,
    /// 属性内容
    pub info: Vec<u8>,
}

impl AttributeInfo {
    fn parse_all(reader: &mut ByteReader<'_>) -> IntrospectionResult<Vec<Self>> {
        let count = reader.u16()?;
        (0..count)
            .map(|_| {
                let name_index = reader.u16()?;
                let len = reader.u32()? as usize;
                Ok(Self {
                    name_index,
                    info: reader.bytes(len)?.to_vec(),
                })
            })
            .collect()
    }

    pub(crate) fn write_all(attributes: &[Self], out: &mut Vec<u8>) {
        out.put_u16(attributes.len() as u16);
        for attribute in attributes {
            out.put_u16(attribute.name_index);
            out.put_u32(attribute.info.len() as u32);
            out.extend_from_slice(&attribute.info);
        }
    }
}

/// 字段或方法
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<AttributeInfo>,
}

impl MemberInfo {
    fn parse_all(reader: &mut ByteReader<'_>) -> IntrospectionResult<Vec<Self>> {
        let count = reader.u16()?;
        (0..count)
            .map(|_| {
                Ok(Self {
                    access_flags: reader.u16()?,
                    name_index: reader.u16()?,
                    descriptor_index: reader.u16()?,
                    attributes: AttributeInfo::parse_all(reader)?,
                })
            })
            .collect()
    }

    fn write_all(members: &[Self], out: &mut Vec<u8>) {
        out.put_u16(members.len() as u16);
        for member in members {
            out.put_u16(member.access_flags);
            out.put_u16(member.name_index);
            out.put_u16(member.descriptor_index);
            AttributeInfo::write_all(&member.attributes, out);
        }
    }
}

/// 类文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    /// 0 表示没有父类（仅 `java.lang.Object`）
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<MemberInfo>,
    pub methods: Vec<MemberInfo>,
    pub attributes: Vec<AttributeInfo>,
}

impl ClassFile {
    /// 解析类文件
    pub fn parse(bytes: &[u8]) -> IntrospectionResult<Self> {
        let mut reader = ByteReader::new(bytes);
        let magic = reader.u32()?;
        if magic != MAGIC {
            return Err(IntrospectionError::BadMagic { magic });
        }

        let minor_version = reader.u16()?;
        let major_version = reader.u16()?;
        let constant_pool = ConstantPool::parse(&mut reader)?;
        let access_flags = reader.u16()?;
        let this_class = reader.u16()?;
        let super_class = reader.u16()?;
        let interface_count = reader.u16()?;
        let interfaces = (0..interface_count)
            .map(|_| reader.u16())
            .collect::<IntrospectionResult<Vec<_>>>()?;
        let fields = MemberInfo::parse_all(&mut reader)?;
        let methods = MemberInfo::parse_all(&mut reader)?;
        let attributes = AttributeInfo::parse_all(&mut reader)?;
        reader.finish()?;

        Ok(Self {
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    /// 序列化为字节
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.put_u32(MAGIC);
        out.put_u16(self.minor_version);
        out.put_u16(self.major_version);
        self.constant_pool.write(&mut out);
        out.put_u16(self.access_flags);
        out.put_u16(self.this_class);
        out.put_u16(self.super_class);
        out.put_u16(self.interfaces.len() as u16);
        for interface in &self.interfaces {
            out.put_u16(*interface);
        }
        MemberInfo::write_all(&self.fields, &mut out);
        MemberInfo::write_all(&self.methods, &mut out);
        AttributeInfo::write_all(&self.attributes, &mut out);
        out
    }

    /// 类型种类
    pub fn kind(&self) -> TypeKind {
        if self.access_flags & ACC_ANNOTATION != 0 {
            TypeKind::Annotation
        } else if self.access_flags & ACC_ENUM != 0 {
            TypeKind::Enum
        } else if self.access_flags & ACC_INTERFACE != 0 {
            TypeKind::Interface
        } else {
            TypeKind::Class
        }
    }

    /// 本类的限定名
    pub fn qualified_name(&self) -> IntrospectionResult<String> {
        Ok(internal_to_qualified(&self.internal_name()?))
    }

    /// 本类的内部名
    pub fn internal_name(&self) -> IntrospectionResult<String> {
        self.constant_pool.class_name(self.this_class)
    }

    /// 父类限定名
    pub fn super_name(&self) -> IntrospectionResult<Option<String>> {
        if self.super_class == 0 {
            return Ok(None);
        }
        let internal = self.constant_pool.class_name(self.super_class)?;
        Ok(Some(internal_to_qualified(&internal)))
    }

    /// 直接实现的接口限定名
    pub fn interface_names(&self) -> IntrospectionResult<Vec<String>> {
        self.interfaces
            .iter()
            .map(|index| {
                let internal = self.constant_pool.class_name(*index)?;
                Ok(internal_to_qualified(&internal))
            })
            .collect()
    }

    /// 查找类级属性
    pub fn attribute(&self, name: &str) -> IntrospectionResult<Option<&AttributeInfo>> {
        find_attribute(&self.constant_pool, &self.attributes, name)
    }

    /// 查找方法位置
    pub fn method_index(&self, name: &str, descriptor: &str) -> IntrospectionResult<Option<usize>> {
        for (index, method) in self.methods.iter().enumerate() {
            if self.constant_pool.utf8(method.name_index)? == name
                && self.constant_pool.utf8(method.descriptor_index)? == descriptor
            {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// 查找方法
    pub fn method(&self, name: &str, descriptor: &str) -> IntrospectionResult<Option<&MemberInfo>> {
        Ok(self
            .method_index(name, descriptor)?
            .map(|index| &self.methods[index]))
    }
}

/// 按名称查找属性
pub fn find_attribute<'a>(
    pool: &ConstantPool,
    attributes: &'a [AttributeInfo],
    name: &str,
) -> IntrospectionResult<Option<&'a AttributeInfo>> {
    for attribute in attributes {
        if pool.utf8(attribute.name_index)? == name {
            return Ok(Some(attribute));
        }
    }
    Ok(None)
}
