//! 多语言错误消息模块
//!
//! 使用rat_embed_lang框架提供统一的错误消息多语言支持

use once_cell::sync::OnceCell;
use rat_embed_lang::register_translations;
use std::collections::HashMap;

static INITIALIZED: OnceCell<()> = OnceCell::new();

/// 错误消息翻译注册器
pub struct ErrorMessageI18n;

fn entry(zh: &str, en: &str, ja: &str) -> HashMap<String, String> {
    let mut messages = HashMap::new();
    messages.insert("zh-CN".to_string(), zh.to_string());
    messages.insert("en-US".to_string(), en.to_string());
    messages.insert("ja-JP".to_string(), ja.to_string());
    messages
}

impl ErrorMessageI18n {
    /// 注册所有错误消息翻译
    pub fn register_all_translations() {
        let mut translations = HashMap::new();

        // 获取连接相关
        translations.insert(
            "error.pool_closed".to_string(),
            entry(
                "连接池已关闭，无法获取连接",
                "Connection pool is closed",
                "接続プールは閉じられています",
            ),
        );
        translations.insert(
            "error.acquire_timeout".to_string(),
            entry(
                "{timeout} 秒内未能获取数据库连接",
                "Failed to obtain a database connection within {timeout} seconds",
                "{timeout} 秒以内にデータベース接続を取得できませんでした",
            ),
        );

        // 物理连接相关
        translations.insert(
            "error.connection_open".to_string(),
            entry(
                "打开数据库连接失败: {message}",
                "Failed to open database connection: {message}",
                "データベース接続のオープンに失敗しました: {message}",
            ),
        );
        translations.insert(
            "error.connection_invalid".to_string(),
            entry(
                "连接校验未通过: {id}",
                "Connection failed validation: {id}",
                "接続の検証に失敗しました: {id}",
            ),
        );
        translations.insert(
            "error.connection_destroyed".to_string(),
            entry(
                "连接已销毁: {id}",
                "Connection already destroyed: {id}",
                "接続は既に破棄されています: {id}",
            ),
        );

        // 语句相关
        translations.insert(
            "error.statement_prepare".to_string(),
            entry(
                "准备语句失败: {message}",
                "Failed to prepare statement: {message}",
                "ステートメントの準備に失敗しました: {message}",
            ),
        );

        // 运行时与配置相关
        translations.insert(
            "error.runtime_missing".to_string(),
            entry(
                "连接池必须在tokio运行时中创建",
                "Connection pool must be created inside a tokio runtime",
                "接続プールはtokioランタイム内で作成する必要があります",
            ),
        );
        translations.insert(
            "error.config_parse".to_string(),
            entry(
                "解析配置文件失败: {message}",
                "Failed to parse configuration file: {message}",
                "設定ファイルの解析に失敗しました: {message}",
            ),
        );
        translations.insert(
            "error.logger_init".to_string(),
            entry(
                "日志初始化失败: {message}",
                "Failed to initialize logger: {message}",
                "ロガーの初期化に失敗しました: {message}",
            ),
        );

        // 注册所有翻译
        register_translations(translations);
    }

    /// 初始化错误消息多语言支持
    ///
    /// 多次调用只会生效一次
    pub fn init() {
        INITIALIZED.get_or_init(|| {
            Self::register_all_translations();

            // 从环境变量获取语言设置，默认为zh-CN
            let lang = std::env::var("RAT_LANG")
                .or_else(|_| std::env::var("LANG"))
                .unwrap_or_else(|_| "zh-CN".to_string());

            // 标准化语言代码
            use rat_embed_lang::normalize_language_code;
            let normalized_lang = normalize_language_code(&lang);
            set_language(&normalized_lang);
        });
    }
}

/// 重新导出rat_embed_lang的核心函数
pub use rat_embed_lang::{current_language, set_language, t, tf};
