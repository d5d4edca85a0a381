//! 静态初始化块注入
//!
//! 每条注册语句编译为：
//!
//! ```text
//! ldc_w         Class(接口)
//! new           实现类
//! dup
//! invokespecial 实现类.<init>()V
//! invokestatic  注册表.register(Ljava/lang/Class;L能力接口;)V
//! ```
//!
//! 已有 `<clinit>` 时，语句块插入到唯一的结尾 `return` 之前，
//! 原本跳转到该 `return` 的分支会先执行注册语句。

use crate::class_file::{AttributeInfo, ClassFile, MemberInfo, ACC_STATIC, CLINIT};
use crate::code::{opcode, CodeAttribute};
use crate::constant_pool::{Constant, ConstantPool};
use crate::reader::{ByteReader, WriteBigEndian};
use infrastructure_common::{
    internal_to_qualified, qualified_to_descriptor, qualified_to_internal, IntrospectionResult,
    MarkerConventions, PatchError, PatchResult,
};
use registry_abstractions::{InitializerPatcher, RegistrationStatement};
use tracing::debug;

const CODE: &str = "Code";
const LOCAL_VARIABLE_TABLE: &str = "LocalVariableTable";
const LOCAL_VARIABLE_TYPE_TABLE: &str = "LocalVariableTypeTable";
const CLINIT_DESCRIPTOR: &str = "()V";
const MAX_CODE_LENGTH: usize = 65535;
/// 注册语句执行期间的最大操作数栈深度
const STATEMENT_STACK: u16 = 3;

/// 类文件静态初始化块注入器
#[derive(Debug, Clone, Default)]
pub struct ClassFilePatcher {
    conventions: MarkerConventions,
}

impl ClassFilePatcher {
    pub fn new(conventions: MarkerConventions) -> Self {
        Self { conventions }
    }

    /// 注册方法描述符
    pub fn register_descriptor(&self) -> String {
        format!(
            "(Ljava/lang/Class;{})V",
            qualified_to_descriptor(&self.conventions.builder_interface)
        )
    }

    /// 生成注册语句的字节码，所需常量追加到常量池
    fn emit(
        &self,
        pool: &mut ConstantPool,
        registry: &str,
        statements: &[RegistrationStatement],
    ) -> PatchResult<Vec<u8>> {
        let register = pool.add_method_ref(
            registry,
            &self.conventions.register_method,
            &self.register_descriptor(),
        )?;

        let mut block = Vec::with_capacity(statements.len() * 13);
        for statement in statements {
            let implementation = qualified_to_internal(&statement.implementation);
            let interface = pool.add_class(&qualified_to_internal(&statement.interface))?;
            let class = pool.add_class(&implementation)?;
            let constructor = pool.add_method_ref(&implementation, "<init>", "()V")?;

            block.put_u8(opcode::LDC_W);
            block.put_u16(interface);
            block.put_u8(opcode::NEW);
            block.put_u16(class);
            block.put_u8(opcode::DUP);
            block.put_u8(opcode::INVOKESPECIAL);
            block.put_u16(constructor);
            block.put_u8(opcode::INVOKESTATIC);
            block.put_u16(register);
        }
        Ok(block)
    }

    fn patch(&self, bytes: &[u8], statements: &[RegistrationStatement]) -> PatchResult<Vec<u8>> {
        let mut class = ClassFile::parse(bytes)?;
        let registry = class.internal_name()?;
        let existing = class.method_index(CLINIT, CLINIT_DESCRIPTOR)?;

        let block = self.emit(&mut class.constant_pool, &registry, statements)?;
        match existing {
            Some(index) => {
                let pool = &class.constant_pool;
                let method = &mut class.methods[index];
                splice_into_initializer(pool, method, &block)?;
                debug!("在 {} 的静态初始化块末尾追加 {} 字节", registry, block.len());
            }
            None => {
                let method = create_initializer(&mut class.constant_pool, block)?;
                class.methods.push(method);
                debug!("为 {} 创建静态初始化块", registry);
            }
        }
        Ok(class.to_bytes())
    }
}

impl ClassFilePatcher {
    /// 读取静态初始化块中已注入的注册语句
    pub fn registrations(bytes: &[u8]) -> IntrospectionResult<Vec<RegistrationStatement>> {
        let class = ClassFile::parse(bytes)?;
        let pool = &class.constant_pool;
        let Some(method) = class.method(CLINIT, CLINIT_DESCRIPTOR)? else {
            return Ok(Vec::new());
        };
        let Some(position) = position_of(pool, &method.attributes, CODE)? else {
            return Ok(Vec::new());
        };
        let code = CodeAttribute::parse(&method.attributes[position].info)?;

        let mut statements = Vec::new();
        let mut interface = None;
        for (pc, op) in code.instructions()? {
            let operand = || u16::from_be_bytes([code.code[pc + 1], code.code[pc + 2]]);
            match op {
                opcode::LDC_W => {
                    interface = match pool.get(operand())? {
                        Constant::Class { .. } => Some(pool.class_name(operand())?),
                        _ => None,
                    };
                }
                opcode::NEW => {
                    if let Some(interface) = interface.take() {
                        let implementation = pool.class_name(operand())?;
                        statements.push(RegistrationStatement::new(
                            internal_to_qualified(&interface),
                            internal_to_qualified(&implementation),
                        ));
                    }
                }
                opcode::DUP | opcode::INVOKESPECIAL | opcode::INVOKESTATIC => {}
                _ => interface = None,
            }
        }
        Ok(statements)
    }
}

impl InitializerPatcher for ClassFilePatcher {
    fn append_static_initializer(
        &self,
        unit_bytes: &[u8],
        statements: &[RegistrationStatement],
    ) -> Result<Vec<u8>, PatchError> {
        if statements.is_empty() {
            return Ok(unit_bytes.to_vec());
        }
        self.patch(unit_bytes, statements)
    }

    fn name(&self) -> &str {
        "ClassFilePatcher"
    }
}

fn create_initializer(pool: &mut ConstantPool, mut block: Vec<u8>) -> PatchResult<MemberInfo> {
    block.push(opcode::RETURN);
    if block.len() > MAX_CODE_LENGTH {
        return Err(PatchError::CodeTooLarge {
            length: block.len(),
        });
    }

    let code = CodeAttribute {
        max_stack: STATEMENT_STACK,
        max_locals: 0,
        code: block,
        exception_table: Vec::new(),
        attributes: Vec::new(),
    };
    Ok(MemberInfo {
        access_flags: ACC_STATIC,
        name_index: pool.add_utf8(CLINIT)?,
        descriptor_index: pool.add_utf8(CLINIT_DESCRIPTOR)?,
        attributes: vec![AttributeInfo {
            name_index: pool.add_utf8(CODE)?,
            info: code.to_bytes(),
        }],
    })
}

fn splice_into_initializer(
    pool: &ConstantPool,
    method: &mut MemberInfo,
    block: &[u8],
) -> PatchResult<()> {
    let Some(position) = position_of(pool, &method.attributes, CODE)? else {
        return Err(PatchError::unsupported_initializer("缺少 Code 属性"));
    };
    let mut code = CodeAttribute::parse(&method.attributes[position].info)?;
    let return_pc = trailing_return(&code)?;

    let old_len = code.code.len();
    let new_len = old_len + block.len();
    if new_len > MAX_CODE_LENGTH {
        return Err(PatchError::CodeTooLarge { length: new_len });
    }

    code.code.splice(return_pc..return_pc, block.iter().copied());
    // 以结尾 return 为处理器入口时，异常对象仍在栈上
    let handled = code
        .exception_table
        .iter()
        .any(|entry| entry.handler_pc as usize == return_pc);
    let needed = if handled { STATEMENT_STACK + 1 } else { STATEMENT_STACK };
    code.max_stack = code.max_stack.max(needed);
    let delta = block.len() as u16;
    // 注册语句不进入已有的异常处理范围：覆盖到结尾 return 的范围截止于语句块之前
    let boundary = return_pc as u16;
    code.exception_table.retain_mut(|entry| {
        if entry.end_pc > boundary {
            entry.end_pc = boundary;
        }
        entry.start_pc < entry.end_pc
    });
    for attribute in &mut code.attributes {
        let name = pool.utf8(attribute.name_index)?;
        if name == LOCAL_VARIABLE_TABLE || name == LOCAL_VARIABLE_TYPE_TABLE {
            attribute.info = extend_local_ranges(&attribute.info, old_len, delta)?;
        }
    }

    method.attributes[position].info = code.to_bytes();
    Ok(())
}

/// 定位唯一且位于末尾的 `return`
fn trailing_return(code: &CodeAttribute) -> PatchResult<usize> {
    let instructions = code.instructions()?;
    let returns: Vec<usize> = instructions
        .iter()
        .filter(|(_, op)| *op == opcode::RETURN)
        .map(|(pc, _)| *pc)
        .collect();

    match (returns.as_slice(), instructions.last()) {
        ([pc], Some((last_pc, opcode::RETURN))) if pc == last_pc => Ok(*pc),
        ([_, _, ..], _) => Err(PatchError::unsupported_initializer(format!(
            "静态初始化块包含 {} 个 return",
            returns.len()
        ))),
        _ => Err(PatchError::unsupported_initializer(
            "静态初始化块未以 return 结尾",
        )),
    }
}

/// 覆盖到代码末尾的局部变量范围随插入的语句一起延长
fn extend_local_ranges(info: &[u8], old_len: usize, delta: u16) -> IntrospectionResult<Vec<u8>> {
    let mut reader = ByteReader::new(info);
    let count = reader.u16()?;
    let mut out = Vec::with_capacity(info.len());
    out.put_u16(count);
    for _ in 0..count {
        let start_pc = reader.u16()?;
        let mut length = reader.u16()?;
        if start_pc as usize + length as usize == old_len {
            length += delta;
        }
        out.put_u16(start_pc);
        out.put_u16(length);
        out.extend_from_slice(reader.bytes(6)?);
    }
    reader.finish()?;
    Ok(out)
}

fn position_of(
    pool: &ConstantPool,
    attributes: &[AttributeInfo],
    name: &str,
) -> IntrospectionResult<Option<usize>> {
    for (index, attribute) in attributes.iter().enumerate() {
        if pool.utf8(attribute.name_index)? == name {
            return Ok(Some(index));
        }
    }
    Ok(None)
}
