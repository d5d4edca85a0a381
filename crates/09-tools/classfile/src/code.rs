//! Code 属性与指令长度解码

use crate::class_file::AttributeInfo;
use crate::reader::{ByteReader, WriteBigEndian};
use infrastructure_common::{IntrospectionError, IntrospectionResult};

pub mod opcode {
    pub const LDC_W: u8 = 0x13;
    pub const DUP: u8 = 0x59;
    pub const RETURN: u8 = 0xb1;
    pub const INVOKESPECIAL: u8 = 0xb7;
    pub const INVOKESTATIC: u8 = 0xb8;
    pub const NEW: u8 = 0xbb;
    pub const TABLESWITCH: u8 = 0xaa;
    pub const LOOKUPSWITCH: u8 = 0xab;
    pub const WIDE: u8 = 0xc4;
    pub const IINC: u8 = 0x84;
}

/// 异常表条目
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    pub catch_type: u16,
}

/// Code 属性
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionEntry>,
    pub attributes: Vec<AttributeInfo>,
}

impl CodeAttribute {
    /// 从属性内容解析
    pub fn parse(info: &[u8]) -> IntrospectionResult<Self> {
        let mut reader = ByteReader::new(info);
        let max_stack = reader.u16()?;
        let max_locals = reader.u16()?;
        let code_len = reader.u32()? as usize;
        let code = reader.bytes(code_len)?.to_vec();

        let exception_count = reader.u16()?;
        let exception_table = (0..exception_count)
            .map(|_| {
                Ok(ExceptionEntry {
                    start_pc: reader.u16()?,
                    end_pc: reader.u16()?,
                    handler_pc: reader.u16()?,
                    catch_type: reader.u16()?,
                })
            })
            .collect::<IntrospectionResult<Vec<_>>>()?;

        let attribute_count = reader.u16()?;
        let attributes = (0..attribute_count)
            .map(|_| {
                let name_index = reader.u16()?;
                let len = reader.u32()? as usize;
                Ok(AttributeInfo {
                    name_index,
                    info: reader.bytes(len)?.to_vec(),
                })
            })
            .collect::<IntrospectionResult<Vec<_>>>()?;
        reader.finish()?;

        Ok(Self {
            max_stack,
            max_locals,
            code,
            exception_table,
            attributes,
        })
    }

    /// 序列化为属性内容
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(12 + self.code.len());
        out.put_u16(self.max_stack);
        out.put_u16(self.max_locals);
        out.put_u32(self.code.len() as u32);
        out.extend_from_slice(&self.code);
        out.put_u16(self.exception_table.len() as u16);
        for entry in &self.exception_table {
            out.put_u16(entry.start_pc);
            out.put_u16(entry.end_pc);
            out.put_u16(entry.handler_pc);
            out.put_u16(entry.catch_type);
        }
        AttributeInfo::write_all(&self.attributes, &mut out);
        out
    }

    /// 按顺序列出所有指令的（位置，操作码）
    pub fn instructions(&self) -> IntrospectionResult<Vec<(usize, u8)>> {
        let mut instructions = Vec::new();
        let mut pc = 0;
        while pc < self.code.len() {
            instructions.push((pc, self.code[pc]));
            pc += instruction_length(&self.code, pc)?;
        }
        Ok(instructions)
    }
}

/// 计算 `pc` 处指令的字节长度
pub fn instruction_length(code: &[u8], pc: usize) -> IntrospectionResult<usize> {
    let opcode = code[pc];
    let len = match opcode {
        opcode::TABLESWITCH => {
            let base = aligned(pc);
            let low = read_i32(code, base + 4)?;
            let high = read_i32(code, base + 8)?;
            if high < low {
                return Err(IntrospectionError::UnknownOpcode { opcode, pc });
            }
            let count = (i64::from(high) - i64::from(low) + 1) as usize;
            base + 12 + count * 4 - pc
        }
        opcode::LOOKUPSWITCH => {
            let base = aligned(pc);
            let pairs = read_i32(code, base + 4)?;
            if pairs < 0 {
                return Err(IntrospectionError::UnknownOpcode { opcode, pc });
            }
            base + 8 + pairs as usize * 8 - pc
        }
        opcode::WIDE => match code.get(pc + 1) {
            Some(&opcode::IINC) => 6,
            Some(_) => 4,
            None => {
                return Err(IntrospectionError::Truncated {
                    offset: pc + 1,
                    needed: 1,
                })
            }
        },
        _ => fixed_length(opcode).ok_or(IntrospectionError::UnknownOpcode { opcode, pc })?,
    };

    if pc + len > code.len() {
        return Err(IntrospectionError::Truncated {
            offset: pc,
            needed: len,
        });
    }
    Ok(len)
}

/// switch 指令的操作数按 4 字节对齐
fn aligned(pc: usize) -> usize {
    (pc + 4) & !3
}

fn read_i32(code: &[u8], offset: usize) -> IntrospectionResult<i32> {
    let mut reader = ByteReader::new(code.get(offset..).unwrap_or_default());
    reader
        .u32()
        .map(|value| value as i32)
        .map_err(|_| IntrospectionError::Truncated { offset, needed: 4 })
}

fn fixed_length(opcode: u8) -> Option<usize> {
    let len = match opcode {
        // 无操作数
        0x00..=0x0f | 0x1a..=0x35 | 0x3b..=0x83 | 0x85..=0x98 | 0xac..=0xb1 | 0xbe | 0xbf
        | 0xc2 | 0xc3 => 1,
        // bipush / ldc / 局部变量索引 / newarray
        0x10 | 0x12 | 0x15..=0x19 | 0x36..=0x3a | 0xa9 | 0xbc => 2,
        // sipush / ldc_w / ldc2_w / iinc / 分支 / 字段与方法 / 类型操作
        0x11 | 0x13 | 0x14 | 0x84 | 0x99..=0xa8 | 0xb2..=0xb8 | 0xbb | 0xbd | 0xc0 | 0xc1
        | 0xc6 | 0xc7 => 3,
        // multianewarray
        0xc5 => 4,
        // invokeinterface / invokedynamic / goto_w / jsr_w
        0xb9 | 0xba | 0xc8 | 0xc9 => 5,
        _ => return None,
    };
    Some(len)
}
