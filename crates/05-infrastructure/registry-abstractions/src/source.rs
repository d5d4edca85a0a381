//! 编译单元来源与输出抽象接口
//!
//! 构建管线协作者通过这两个接口向扫描引擎提供输入并接收输出

use crate::unit::{CompiledUnit, UnitLocation};
use async_trait::async_trait;
use infrastructure_common::TransformError;

/// 编译单元来源 trait
///
/// 枚举所有编译单元及其变更状态
#[async_trait]
pub trait UnitSource: Send + Sync {
    /// 获取来源名称
    fn name(&self) -> &str;

    /// 枚举编译单元
    async fn units(&self) -> Result<Vec<CompiledUnit>, TransformError>;

    /// 枚举需要原样复制的非编译单元文件
    async fn resources(&self) -> Result<Vec<(UnitLocation, Vec<u8>)>, TransformError> {
        Ok(Vec::new())
    }
}

/// 输出接收端 trait
#[async_trait]
pub trait UnitSink: Send + Sync {
    /// 写入（或覆盖）一个输出单元
    async fn write_unit(&mut self, location: &UnitLocation, bytes: &[u8])
        -> Result<(), TransformError>;

    /// 删除一个输出单元
    async fn remove_unit(&mut self, location: &UnitLocation) -> Result<(), TransformError>;
}
