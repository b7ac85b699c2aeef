use std::borrow::Cow;
use std::ffi::CStr;

use ash::vk;

/// validation layer 消息的级别
pub const DEBUG_MSG_SEVERITY: vk::DebugUtilsMessageSeverityFlagsEXT = vk::DebugUtilsMessageSeverityFlagsEXT::from_raw(
    vk::DebugUtilsMessageSeverityFlagsEXT::WARNING.as_raw() | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR.as_raw(),
);

pub const DEBUG_MSG_TYPE: vk::DebugUtilsMessageTypeFlagsEXT = vk::DebugUtilsMessageTypeFlagsEXT::from_raw(
    vk::DebugUtilsMessageTypeFlagsEXT::GENERAL.as_raw()
        | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION.as_raw()
        | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE.as_raw(),
);

/// 用于创建 debug messenger 的结构体
///
/// 同时也会挂在 InstanceCreateInfo 的 p_next 上，覆盖 instance 的创建和销毁过程
pub fn debug_utils_messenger_ci() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(DEBUG_MSG_SEVERITY)
        .message_type(DEBUG_MSG_TYPE)
        .pfn_user_callback(Some(vk_debug_callback))
}

/// debug messenger 的回调函数，将 validation 信息转发到 log
///
/// # Safety
/// 由 validation layer 调用，`p_callback_data` 在回调期间有效
unsafe extern "system" fn vk_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    let msg = if p_callback_data.is_null() {
        Cow::from("")
    } else {
        let callback_data = unsafe { *p_callback_data };
        if callback_data.p_message.is_null() {
            Cow::from("")
        } else {
            unsafe { CStr::from_ptr(callback_data.p_message).to_string_lossy() }
        }
    };

    let format_msg = format!("[{:?}]\n{}", message_type, format_validation_message(&msg));
    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => log::error!("{}", format_msg),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => log::warn!("{}", format_msg),
        _ => log::info!("{}", format_msg),
    };

    // 只有 layer developer 才需要返回 True
    vk::FALSE
}

/// 新版本的 validation layer 会输出 json，MainMessage 字段里面有换行符，需要单独输出
fn format_validation_message(msg: &str) -> String {
    let Ok(serde_json::Value::Object(mut obj)) = serde_json::from_str::<serde_json::Value>(msg) else {
        return msg.to_string();
    };

    let main_msg = obj.remove("MainMessage");
    let main_msg = main_msg.as_ref().and_then(|value| value.as_str()).unwrap_or_default();
    let rest = serde_json::to_string_pretty(&obj).unwrap_or_default();
    format!("{}\n{}", rest, main_msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_message_untouched() {
        let msg = "Validation Error: [ VUID-vkDestroyDevice-device-05137 ]";
        assert_eq!(format_validation_message(msg), msg);
    }

    #[test]
    fn test_json_main_message_moved_to_end() {
        let msg = r#"{"MessageID": 42, "MainMessage": "line one\nline two"}"#;
        let formatted = format_validation_message(msg);
        assert!(formatted.ends_with("line one\nline two"));
        assert!(formatted.contains("\"MessageID\": 42"));
        assert!(!formatted.contains("MainMessage"));
    }
}
