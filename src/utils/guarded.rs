use std::sync::{PoisonError, RwLock};

/// 受读写锁保护的单个状态值
///
/// 把“锁 + 标志位”合成一个值类型：运行标志、待完成请求等跨线程状态都用它承载，
/// 读取拿共享锁，写入拿独占锁，持锁时间只覆盖一次拷贝或替换。
#[derive(Debug, Default)]
pub struct Guarded<T> {
    value: RwLock<T>,
}

impl<T> Guarded<T> {
    pub fn new(value: T) -> Self {
        Self { value: RwLock::new(value) }
    }

    /// 替换当前值，返回旧值
    pub fn replace(&self, value: T) -> T {
        let mut guard = self.value.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, value)
    }

    /// 在独占锁内修改值
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.value.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// 在共享锁内读取值
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.value.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }
}

impl<T: Clone> Guarded<T> {
    pub fn get(&self) -> T {
        self.read(T::clone)
    }

    pub fn set(&self, value: T) {
        self.replace(value);
    }
}
