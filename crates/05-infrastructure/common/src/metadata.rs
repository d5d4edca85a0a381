//! 元数据定义
//!
//! 描述编译单元的结构信息：类型种类、父类型以及注解

use serde::{Deserialize, Serialize};

/// 类型种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    /// 普通类（包括抽象类）
    Class,
    /// 接口
    Interface,
    /// 枚举
    Enum,
    /// 注解类型
    Annotation,
}

impl TypeKind {
    /// 是否为注解或枚举（分类时直接忽略）
    pub fn is_annotation_or_enum(self) -> bool {
        matches!(self, TypeKind::Annotation | TypeKind::Enum)
    }
}

/// 注解成员值
#[derive(Debug, Clone, PartialEq)]
pub enum MemberValue {
    /// 布尔常量
    Boolean(bool),
    /// 整数常量（byte/char/short/int/long）
    Integer(i64),
    /// 浮点常量（float/double）
    Float(f64),
    /// 字符串常量
    String(String),
    /// 枚举常量
    Enum { type_name: String, constant: String },
    /// 类引用，保存限定名
    Class(String),
    /// 嵌套注解
    Annotation(Box<AnnotationInfo>),
    /// 数组
    Array(Vec<MemberValue>),
}

impl MemberValue {
    /// 类型名称，用于错误信息
    pub fn shape(&self) -> &'static str {
        match self {
            MemberValue::Boolean(_) => "boolean",
            MemberValue::Integer(_) => "integer",
            MemberValue::Float(_) => "float",
            MemberValue::String(_) => "string",
            MemberValue::Enum { .. } => "enum",
            MemberValue::Class(_) => "class",
            MemberValue::Annotation(_) => "annotation",
            MemberValue::Array(_) => "array",
        }
    }
}

/// 注解信息
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationInfo {
    /// 注解类型限定名
    pub type_name: String,
    /// 显式给出的成员，按声明顺序
    pub members: Vec<(String, MemberValue)>,
}

impl AnnotationInfo {
    /// 创建新的注解信息
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            members: Vec::new(),
        }
    }

    /// 添加成员
    pub fn with_member(mut self, name: impl Into<String>, value: MemberValue) -> Self {
        self.members.push((name.into(), value));
        self
    }

    /// 按名称获取成员值
    pub fn member(&self, name: &str) -> Option<&MemberValue> {
        self.members
            .iter()
            .find(|(member_name, _)| member_name == name)
            .map(|(_, value)| value)
    }
}

/// 类型描述符
///
/// 一个编译单元的结构元数据，由类型模型缓存持有
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    /// 限定名，例如 `com.example.FooFactory`
    pub qualified_name: String,
    /// 类型种类
    pub kind: TypeKind,
    /// 父类限定名（`java.lang.Object` 与接口可能为空）
    pub super_name: Option<String>,
    /// 直接实现的接口
    pub interfaces: Vec<String>,
    /// 类型上的注解（可见与不可见合并）
    pub annotations: Vec<AnnotationInfo>,
}

impl TypeDescriptor {
    /// 创建新的类型描述符
    pub fn new(qualified_name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            kind,
            super_name: None,
            interfaces: Vec::new(),
            annotations: Vec::new(),
        }
    }

    /// 设置父类
    pub fn with_super(mut self, super_name: impl Into<String>) -> Self {
        self.super_name = Some(super_name.into());
        self
    }

    /// 添加接口
    pub fn with_interface(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// 添加注解
    pub fn with_annotation(mut self, annotation: AnnotationInfo) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// 是否带有指定注解
    pub fn has_annotation(&self, type_name: &str) -> bool {
        self.annotation(type_name).is_some()
    }

    /// 获取指定注解
    pub fn annotation(&self, type_name: &str) -> Option<&AnnotationInfo> {
        self.annotations
            .iter()
            .find(|annotation| annotation.type_name == type_name)
    }

    /// 直接父类型（父类与接口）
    pub fn supertypes(&self) -> impl Iterator<Item = &str> {
        self.super_name
            .as_deref()
            .into_iter()
            .chain(self.interfaces.iter().map(String::as_str))
    }
}

/// 将 JVM 内部名（`a/b/C`）转换为限定名（`a.b.C`）
pub fn internal_to_qualified(internal: &str) -> String {
    internal.replace('/', ".")
}

/// 将限定名转换为 JVM 内部名
pub fn qualified_to_internal(qualified: &str) -> String {
    qualified.replace('.', "/")
}

/// 将字段描述符（`Lcom/x/Foo;`、`[I`）转换为限定名
pub fn descriptor_to_qualified(descriptor: &str) -> Option<String> {
    let dimensions = descriptor.chars().take_while(|c| *c == '[').count();
    let element = &descriptor[dimensions..];
    let base = match element {
        "B" => "byte".to_string(),
        "C" => "char".to_string(),
        "D" => "double".to_string(),
        "F" => "float".to_string(),
        "I" => "int".to_string(),
        "J" => "long".to_string(),
        "S" => "short".to_string(),
        "Z" => "boolean".to_string(),
        "V" => "void".to_string(),
        _ => {
            let inner = element.strip_prefix('L')?.strip_suffix(';')?;
            if inner.is_empty() {
                return None;
            }
            internal_to_qualified(inner)
        }
    };
    Some(format!("{}{}", base, "[]".repeat(dimensions)))
}

/// 将限定名转换为对象字段描述符（`Lcom/x/Foo;`）
pub fn qualified_to_descriptor(qualified: &str) -> String {
    format!("L{};", qualified_to_internal(qualified))
}
