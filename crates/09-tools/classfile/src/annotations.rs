//! 注解属性
//!
//! 读写 `RuntimeVisibleAnnotations` 与 `RuntimeInvisibleAnnotations` 的内容。
//! 类引用与枚举类型在读取时转换为限定名。

use crate::constant_pool::ConstantPool;
use crate::reader::{ByteReader, WriteBigEndian};
use infrastructure_common::{
    descriptor_to_qualified, qualified_to_descriptor, AnnotationInfo, IntrospectionError,
    IntrospectionResult, MemberValue, PatchResult,
};

pub const RUNTIME_VISIBLE_ANNOTATIONS: &str = "RuntimeVisibleAnnotations";
pub const RUNTIME_INVISIBLE_ANNOTATIONS: &str = "RuntimeInvisibleAnnotations";

/// 解析注解属性内容
pub fn parse_annotations(
    pool: &ConstantPool,
    info: &[u8],
) -> IntrospectionResult<Vec<AnnotationInfo>> {
    let mut reader = ByteReader::new(info);
    let count = reader.u16()?;
    let annotations = (0..count)
        .map(|_| parse_annotation(pool, &mut reader))
        .collect::<IntrospectionResult<Vec<_>>>()?;
    reader.finish()?;
    Ok(annotations)
}

fn parse_annotation(
    pool: &ConstantPool,
    reader: &mut ByteReader<'_>,
) -> IntrospectionResult<AnnotationInfo> {
    let type_name = type_name(pool, reader.u16()?)?;
    let pair_count = reader.u16()?;
    let mut annotation = AnnotationInfo::new(type_name);
    for _ in 0..pair_count {
        let name = pool.utf8(reader.u16()?)?;
        let value = parse_element_value(pool, reader)?;
        annotation = annotation.with_member(name, value);
    }
    Ok(annotation)
}

fn parse_element_value(
    pool: &ConstantPool,
    reader: &mut ByteReader<'_>,
) -> IntrospectionResult<MemberValue> {
    let tag = reader.u8()?;
    let value = match tag {
        b'B' | b'C' | b'I' | b'S' => MemberValue::Integer(i64::from(pool.integer(reader.u16()?)?)),
        b'Z' => MemberValue::Boolean(pool.integer(reader.u16()?)? != 0),
        b'J' => MemberValue::Integer(pool.long(reader.u16()?)?),
        b'F' => MemberValue::Float(f64::from(pool.float(reader.u16()?)?)),
        b'D' => MemberValue::Float(pool.double(reader.u16()?)?),
        b's' => MemberValue::String(pool.utf8(reader.u16()?)?),
        b'e' => {
            let type_name = type_name(pool, reader.u16()?)?;
            let constant = pool.utf8(reader.u16()?)?;
            MemberValue::Enum {
                type_name,
                constant,
            }
        }
        b'c' => MemberValue::Class(type_name(pool, reader.u16()?)?),
        b'@' => MemberValue::Annotation(Box::new(parse_annotation(pool, reader)?)),
        b'[' => {
            let count = reader.u16()?;
            MemberValue::Array(
                (0..count)
                    .map(|_| parse_element_value(pool, reader))
                    .collect::<IntrospectionResult<Vec<_>>>()?,
            )
        }
        other => {
            return Err(IntrospectionError::malformed_annotation(format!(
                "未知的成员值标签: {:?}",
                char::from(other)
            )))
        }
    };
    Ok(value)
}

fn type_name(pool: &ConstantPool, index: u16) -> IntrospectionResult<String> {
    let descriptor = pool.utf8(index)?;
    descriptor_to_qualified(&descriptor).ok_or_else(|| {
        IntrospectionError::malformed_annotation(format!("无效的类型描述符: {}", descriptor))
    })
}

/// 编码注解属性内容，所需常量追加到常量池
pub fn encode_annotations(
    pool: &mut ConstantPool,
    annotations: &[AnnotationInfo],
) -> PatchResult<Vec<u8>> {
    let mut out = Vec::new();
    out.put_u16(annotations.len() as u16);
    for annotation in annotations {
        encode_annotation(pool, annotation, &mut out)?;
    }
    Ok(out)
}

fn encode_annotation(
    pool: &mut ConstantPool,
    annotation: &AnnotationInfo,
    out: &mut Vec<u8>,
) -> PatchResult<()> {
    out.put_u16(pool.add_utf8(&qualified_to_descriptor(&annotation.type_name))?);
    out.put_u16(annotation.members.len() as u16);
    for (name, value) in &annotation.members {
        out.put_u16(pool.add_utf8(name)?);
        encode_element_value(pool, value, out)?;
    }
    Ok(())
}

fn encode_element_value(
    pool: &mut ConstantPool,
    value: &MemberValue,
    out: &mut Vec<u8>,
) -> PatchResult<()> {
    match value {
        MemberValue::Boolean(flag) => {
            out.put_u8(b'Z');
            out.put_u16(pool.add_integer(i32::from(*flag))?);
        }
        MemberValue::Integer(number) => match i32::try_from(*number) {
            Ok(small) => {
                out.put_u8(b'I');
                out.put_u16(pool.add_integer(small)?);
            }
            Err(_) => {
                out.put_u8(b'J');
                out.put_u16(pool.add_long(*number)?);
            }
        },
        MemberValue::Float(number) => {
            out.put_u8(b'D');
            out.put_u16(pool.add_double(*number)?);
        }
        MemberValue::String(text) => {
            out.put_u8(b's');
            out.put_u16(pool.add_utf8(text)?);
        }
        MemberValue::Enum {
            type_name,
            constant,
        } => {
            out.put_u8(b'e');
            out.put_u16(pool.add_utf8(&qualified_to_descriptor(type_name))?);
            out.put_u16(pool.add_utf8(constant)?);
        }
        MemberValue::Class(name) => {
            out.put_u8(b'c');
            out.put_u16(pool.add_utf8(&qualified_to_descriptor(name))?);
        }
        MemberValue::Annotation(nested) => {
            out.put_u8(b'@');
            encode_annotation(pool, nested, out)?;
        }
        MemberValue::Array(values) => {
            out.put_u8(b'[');
            out.put_u16(values.len() as u16);
            for value in values {
                encode_element_value(pool, value, out)?;
            }
        }
    }
    Ok(())
}
