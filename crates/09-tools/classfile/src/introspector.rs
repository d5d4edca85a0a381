//! 基于类文件的类型内省器

use crate::annotations::{
    parse_annotations, RUNTIME_INVISIBLE_ANNOTATIONS, RUNTIME_VISIBLE_ANNOTATIONS,
};
use crate::class_file::ClassFile;
use infrastructure_common::{IntrospectionError, TypeDescriptor};
use registry_abstractions::TypeIntrospector;

/// 类文件内省器
///
/// 同时读取可见与不可见注解，构建器标记使用 CLASS 保留策略，只出现在后者中。
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassFileIntrospector;

impl ClassFileIntrospector {
    pub fn new() -> Self {
        Self
    }

    /// 从已解析的类文件构建描述符
    pub fn describe(class: &ClassFile) -> Result<TypeDescriptor, IntrospectionError> {
        let mut descriptor = TypeDescriptor::new(class.qualified_name()?, class.kind());
        if let Some(super_name) = class.super_name()? {
            descriptor = descriptor.with_super(super_name);
        }
        for interface in class.interface_names()? {
            descriptor = descriptor.with_interface(interface);
        }

        for attribute_name in [RUNTIME_VISIBLE_ANNOTATIONS, RUNTIME_INVISIBLE_ANNOTATIONS] {
            if let Some(attribute) = class.attribute(attribute_name)? {
                for annotation in parse_annotations(&class.constant_pool, &attribute.info)? {
                    descriptor = descriptor.with_annotation(annotation);
                }
            }
        }
        Ok(descriptor)
    }
}

impl TypeIntrospector for ClassFileIntrospector {
    fn introspect(&self, bytes: &[u8]) -> Result<TypeDescriptor, IntrospectionError> {
        let class = ClassFile::parse(bytes)?;
        Self::describe(&class)
    }

    fn name(&self) -> &str {
        "ClassFileIntrospector"
    }
}
