use serde::{Deserialize, Serialize};

use crate::value_objects::UserId;

/// 用户档案摘要。账号与资料管理在别的系统里完成，
/// 这里只读：侧边栏"对方用户"和房间详情的成员列表会用到。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub nickname: String,
    pub avatar_url: Option<String>,
    pub email: String,
}
