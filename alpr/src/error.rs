use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlprError {
    #[error("裁剪图像为空, 无法生成候选变体")]
    EmptyCrop,
    #[error(transparent)]
    AnyhowError(#[from] anyhow::Error),
}
