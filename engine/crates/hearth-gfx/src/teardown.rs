use crate::driver::GfxDriver;

type TeardownFn = Box<dyn FnOnce(&dyn GfxDriver)>;

/// 多步初始化过程中的回滚栈
///
/// 每创建一个对象就压入对应的销毁操作。初始化中途失败时调用 [`TeardownStack::unwind`]，
/// 按创建的逆序销毁已经创建的对象；全部成功后调用 [`TeardownStack::disarm`]，
/// 对象的所有权转交给调用者
#[derive(Default)]
pub struct TeardownStack {
    steps: Vec<(&'static str, TeardownFn)>,
}

impl TeardownStack {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, name: &'static str, teardown: impl FnOnce(&dyn GfxDriver) + 'static) {
        self.steps.push((name, Box::new(teardown)));
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// 按压栈的逆序执行所有销毁操作
    pub fn unwind(mut self, driver: &dyn GfxDriver) {
        while let Some((name, teardown)) = self.steps.pop() {
            log::debug!("rollback: destroy {}", name);
            teardown(driver);
        }
    }

    /// 初始化成功，丢弃所有销毁操作
    #[inline]
    pub fn disarm(mut self) {
        self.steps.clear();
    }
}

impl Drop for TeardownStack {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            debug_assert!(
                self.steps.is_empty(),
                "teardown stack dropped with {} pending steps: {:?}",
                self.steps.len(),
                self.steps.iter().map(|(name, _)| *name).collect::<Vec<_>>()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::driver::fake_driver::{FakeDriver, FakeDriverConfig};

    #[test]
    fn test_unwind_in_reverse_order() {
        let driver = FakeDriver::new(FakeDriverConfig::default());
        let order = Rc::new(RefCell::new(Vec::new()));

        let mut stack = TeardownStack::new();
        for name in ["first", "second", "third"] {
            let order = order.clone();
            stack.push(name, move |_| order.borrow_mut().push(name));
        }
        assert_eq!(stack.len(), 3);

        stack.unwind(&driver);
        assert_eq!(*order.borrow(), vec!["third", "second", "first"]);
    }

    #[test]
    fn test_disarm_skips_teardown() {
        let driver = FakeDriver::new(FakeDriverConfig::default());
        let semaphore = driver.create_semaphore().unwrap();

        let mut stack = TeardownStack::new();
        stack.push("semaphore", move |driver| driver.destroy_semaphore(semaphore));
        stack.disarm();

        assert_eq!(driver.live_objects().len(), 1);
        driver.destroy_semaphore(semaphore);
    }

    #[test]
    fn test_unwind_destroys_driver_objects() {
        let driver = FakeDriver::new(FakeDriverConfig::default());
        let mut stack = TeardownStack::new();

        let semaphore = driver.create_semaphore().unwrap();
        stack.push("semaphore", move |driver| driver.destroy_semaphore(semaphore));
        let fence = driver.create_fence(true).unwrap();
        stack.push("fence", move |driver| driver.destroy_fence(fence));

        stack.unwind(&driver);
        assert!(driver.live_objects().is_empty());

        let mut destroyed = driver.destroyed();
        let mut created = driver.created();
        created.reverse();
        assert_eq!(destroyed.len(), 2);
        assert_eq!(destroyed.drain(..).collect::<Vec<_>>(), created);
    }
}
