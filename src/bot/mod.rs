/// 電子郵件通知
pub mod email;
/// WhatsApp 通知
pub mod whatsapp;
