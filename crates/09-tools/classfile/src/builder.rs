//! 最小类文件构建器
//!
//! 用于测试与演示：只生成类名、父类、接口、注解以及可选的静态初始化块。

use crate::annotations::{
    encode_annotations, RUNTIME_INVISIBLE_ANNOTATIONS, RUNTIME_VISIBLE_ANNOTATIONS,
};
use crate::class_file::{
    AttributeInfo, ClassFile, MemberInfo, ACC_ABSTRACT, ACC_INTERFACE, ACC_PUBLIC, ACC_STATIC,
    ACC_SUPER, CLINIT,
};
use crate::code::{CodeAttribute, ExceptionEntry};
use crate::constant_pool::ConstantPool;
use infrastructure_common::{qualified_to_internal, AnnotationInfo, PatchResult};

/// Java 8 的主版本号
pub const JAVA_8: u16 = 52;

#[derive(Debug, Clone)]
struct StaticInitializer {
    code: Vec<u8>,
    max_stack: u16,
    max_locals: u16,
    exception_table: Vec<ExceptionEntry>,
}

/// 类文件构建器
#[derive(Debug, Clone)]
pub struct ClassFileBuilder {
    name: String,
    super_name: Option<String>,
    interfaces: Vec<String>,
    access_flags: u16,
    major_version: u16,
    visible: Vec<AnnotationInfo>,
    invisible: Vec<AnnotationInfo>,
    static_initializer: Option<StaticInitializer>,
}

impl ClassFileBuilder {
    /// 普通公开类，父类为 `java.lang.Object`
    pub fn class(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            super_name: Some("java.lang.Object".to_string()),
            interfaces: Vec::new(),
            access_flags: ACC_PUBLIC | ACC_SUPER,
            major_version: JAVA_8,
            visible: Vec::new(),
            invisible: Vec::new(),
            static_initializer: None,
        }
    }

    /// 公开接口
    pub fn interface(name: impl Into<String>) -> Self {
        Self::class(name).access_flags(ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT)
    }

    pub fn extends(mut self, super_name: impl Into<String>) -> Self {
        self.super_name = Some(super_name.into());
        self
    }

    /// 不写父类（仅用于 `java.lang.Object` 本身）
    pub fn without_super(mut self) -> Self {
        self.super_name = None;
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn access_flags(mut self, flags: u16) -> Self {
        self.access_flags = flags;
        self
    }

    pub fn major_version(mut self, version: u16) -> Self {
        self.major_version = version;
        self
    }

    /// 添加 CLASS 保留策略的注解
    pub fn annotate(mut self, annotation: AnnotationInfo) -> Self {
        self.invisible.push(annotation);
        self
    }

    /// 添加 RUNTIME 保留策略的注解
    pub fn annotate_visible(mut self, annotation: AnnotationInfo) -> Self {
        self.visible.push(annotation);
        self
    }

    /// 设置静态初始化块的字节码
    pub fn static_initializer(mut self, code: Vec<u8>, max_stack: u16, max_locals: u16) -> Self {
        self.static_initializer = Some(StaticInitializer {
            code,
            max_stack,
            max_locals,
            exception_table: Vec::new(),
        });
        self
    }

    /// 为静态初始化块添加异常表条目
    pub fn exception_entry(mut self, entry: ExceptionEntry) -> Self {
        if let Some(initializer) = self.static_initializer.as_mut() {
            initializer.exception_table.push(entry);
        }
        self
    }

    /// 生成类文件字节
    pub fn build(&self) -> PatchResult<Vec<u8>> {
        let mut pool = ConstantPool::new();
        let this_class = pool.add_class(&qualified_to_internal(&self.name))?;
        let super_class = match &self.super_name {
            Some(name) => pool.add_class(&qualified_to_internal(name))?,
            None => 0,
        };
        let interfaces = self
            .interfaces
            .iter()
            .map(|name| pool.add_class(&qualified_to_internal(name)))
            .collect::<PatchResult<Vec<_>>>()?;

        let mut methods = Vec::new();
        if let Some(initializer) = &self.static_initializer {
            let code = CodeAttribute {
                max_stack: initializer.max_stack,
                max_locals: initializer.max_locals,
                code: initializer.code.clone(),
                exception_table: initializer.exception_table.clone(),
                attributes: Vec::new(),
            };
            methods.push(MemberInfo {
                access_flags: ACC_STATIC,
                name_index: pool.add_utf8(CLINIT)?,
                descriptor_index: pool.add_utf8("()V")?,
                attributes: vec![AttributeInfo {
                    name_index: pool.add_utf8("Code")?,
                    info: code.to_bytes(),
                }],
            });
        }

        let mut attributes = Vec::new();
        for (name, annotations) in [
            (RUNTIME_VISIBLE_ANNOTATIONS, &self.visible),
            (RUNTIME_INVISIBLE_ANNOTATIONS, &self.invisible),
        ] {
            if annotations.is_empty() {
                continue;
            }
            let info = encode_annotations(&mut pool, annotations)?;
            attributes.push(AttributeInfo {
                name_index: pool.add_utf8(name)?,
                info,
            });
        }

        let class = ClassFile {
            minor_version: 0,
            major_version: self.major_version,
            constant_pool: pool,
            access_flags: self.access_flags,
            this_class,
            super_class,
            interfaces,
            fields: Vec::new(),
            methods,
            attributes,
        };
        Ok(class.to_bytes())
    }
}
