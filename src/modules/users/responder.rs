//! 把服务层的 Outcome 转换为 HTTP 响应；闪存消息经 `_flash` Cookie 传到下一个请求
//! Turns service outcomes into HTTP responses; flash rides the `_flash` cookie

use actix_web::cookie::Cookie;
use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse};
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::service::{Flash, Outcome, Reply};

pub const FLASH_COOKIE: &str = "_flash";

/// 获取客户端 IP 地址 / Resolve the requester's IP address
pub fn client_ip(req: &HttpRequest) -> String {
    if let Some(forwarded_for) = req.headers().get("X-Forwarded-For") {
        if let Ok(forwarded_for_str) = forwarded_for.to_str() {
            if let Some(first_ip) = forwarded_for_str.split(',').next() {
                let ip = first_ip.trim();
                if !ip.is_empty() {
                    return ip.to_string();
                }
            }
        }
    }

    if let Some(real_ip) = req.headers().get("X-Real-IP") {
        if let Ok(real_ip_str) = real_ip.to_str() {
            return real_ip_str.trim().to_string();
        }
    }

    // 回退到连接信息
    req.connection_info()
        .peer_addr()
        .unwrap_or("unknown")
        .to_string()
}

pub fn referer(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// 读取上一个请求留下的闪存；损坏的 Cookie 视为空
pub fn incoming_flash(req: &HttpRequest) -> Flash {
    req.cookie(FLASH_COOKIE)
        .and_then(|cookie| decode_flash(cookie.value()))
        .unwrap_or_default()
}

pub fn encode_flash(flash: &Flash) -> AppResult<String> {
    let raw = serde_json::to_string(flash).map_err(|e| AppError::Internal(e.into()))?;
    Ok(urlencoding::encode(&raw).into_owned())
}

pub fn decode_flash(value: &str) -> Option<Flash> {
    let raw = urlencoding::decode(value).ok()?;
    serde_json::from_str(&raw).ok()
}

fn flash_cookie(value: String) -> Cookie<'static> {
    Cookie::build(FLASH_COOKIE, value)
        .path("/")
        .http_only(true)
        .finish()
}

fn removal_cookie() -> Cookie<'static> {
    let mut cookie = flash_cookie(String::new());
    cookie.make_removal();
    cookie
}

/// 渲染 → 200 JSON `{view, data, flash}`；重定向 → 302 + Location；片段 → text/html
pub fn respond(req: &HttpRequest, outcome: Outcome) -> AppResult<HttpResponse> {
    let had_flash = req.cookie(FLASH_COOKIE).is_some();

    match outcome.reply {
        Reply::Redirect(location) => {
            let mut builder = HttpResponse::Found();
            builder.insert_header((header::LOCATION, location));
            if !outcome.flash.is_empty() {
                builder.cookie(flash_cookie(encode_flash(&outcome.flash)?));
            } else if had_flash {
                builder.cookie(removal_cookie());
            }
            Ok(builder.finish())
        }
        Reply::Render(view) => {
            let flash = outcome.flash.merge(incoming_flash(req));
            let mut body = serde_json::to_value(&view).map_err(|e| AppError::Internal(e.into()))?;
            if let Some(map) = body.as_object_mut() {
                map.insert("flash".to_string(), json!(flash));
            }
            let mut builder = HttpResponse::Ok();
            if had_flash {
                builder.cookie(removal_cookie());
            }
            Ok(builder.json(body))
        }
        Reply::Fragment(html) => {
            let mut builder = HttpResponse::Ok();
            if had_flash {
                builder.cookie(removal_cookie());
            }
            Ok(builder.content_type("text/html; charset=utf-8").body(html))
        }
    }
}
