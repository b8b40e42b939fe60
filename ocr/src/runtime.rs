use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};
use image::DynamicImage;
use tracing::{debug, warn};

use crate::ocr::{Ocr, OcrResult};
use crate::pp_ocr::{OcrEngineConfig, PPOcr};

/// 识别请求
struct Job {
    image: DynamicImage,
    reply: Sender<Result<OcrResult>>,
}

/// OCR 运行时
///
/// 引擎在独立工作线程中创建, 进程内仅初始化一次并常驻整个进程生命周期, 没有销毁路径;
/// 调用方通过通道提交识别请求并带超时等待结果, 超时的请求按空结果处理,
/// 以保证候选变体循环不会被单次识别拖死
pub struct OcrRuntime {
    jobs: Sender<Job>,
    timeout: Duration,
}

impl OcrRuntime {
    /// 创建 OCR 运行时并等待引擎初始化完成
    ///
    /// # 参数
    ///
    /// * `config` - OCR 引擎配置
    /// * `timeout` - 单次识别超时时长
    pub fn new(config: &OcrEngineConfig, timeout: Duration) -> Result<OcrRuntime> {
        let (jobs, job_receiver) = unbounded::<Job>();
        let (ready_sender, ready_receiver) = bounded::<Result<()>>(1);
        let config = config.clone();

        thread::Builder::new()
            .name("ocr-engine".to_string())
            .spawn(move || Self::engine_loop(config, job_receiver, ready_sender))
            .context("启动 OCR 工作线程失败")?;

        ready_receiver.recv().context("OCR 工作线程初始化无响应")??;

        Ok(OcrRuntime { jobs, timeout })
    }

    /// 引擎工作循环, 引擎只在该线程内创建和使用
    fn engine_loop(config: OcrEngineConfig, jobs: Receiver<Job>, ready: Sender<Result<()>>) {
        let engine = match PPOcr::new(&config) {
            Ok(engine) => {
                let _ = ready.send(Ok(()));
                engine
            }
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };

        for job in jobs.iter() {
            let result = Self::recognize_with_retry(&engine, &job.image);
            // 调用方超时放弃等待时发送失败, 直接丢弃结果
            let _ = job.reply.send(result);
        }
    }

    /// 识别一次, 引擎失败时用显式转换像素格式后的图像重试一次
    ///
    /// 重试仍失败按空结果处理, 由调用方继续尝试下一个候选变体
    fn recognize_with_retry(engine: &PPOcr, image: &DynamicImage) -> Result<OcrResult> {
        match engine.recognize(image) {
            Ok(result) => Ok(result),
            Err(e) => {
                debug!("识别失败, 转换像素格式后重试: {}", e);
                let coerced = DynamicImage::ImageRgba8(image.to_rgba8());
                match engine.recognize(&coerced) {
                    Ok(result) => Ok(result),
                    Err(e) => {
                        warn!("重试识别仍然失败, 按空结果处理: {}", e);
                        Ok(OcrResult::empty())
                    }
                }
            }
        }
    }
}

impl Ocr for OcrRuntime {
    /// 识别图片中的文字, 超时按空结果处理
    ///
    /// # 参数
    ///
    /// * `image` - 待识别的图片
    fn recognize(&self, image: &DynamicImage) -> Result<OcrResult> {
        let (reply, reply_receiver) = bounded(1);
        self.jobs
            .send(Job {
                image: image.clone(),
                reply,
            })
            .map_err(|_| anyhow!("OCR 工作线程已退出"))?;

        match reply_receiver.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                warn!("识别超时 ({:?}), 按空结果处理", self.timeout);
                Ok(OcrResult::empty())
            }
            Err(RecvTimeoutError::Disconnected) => Err(anyhow!("OCR 工作线程已退出")),
        }
    }
}
